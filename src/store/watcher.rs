//! Background watch producer.
//!
//! # Responsibilities
//! - Long-poll the store for changes below the prefix
//! - Push one `ChangeNotification` per observed change into a bounded queue
//! - Reconnect with backoff on transport errors
//! - Close the stream (drop the sender) when the store stays unreachable
//! - Start from the store index read before the initial sync, so no change
//!   made while that sync runs is missed
//!
//! # Design Decisions
//! - Notifications carry no payload; a full queue drops extra ones since the
//!   consumer always re-fetches
//! - The loop is the only consumer; the producer never touches the model

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::WatchConfig;
use crate::observability::metrics;
use crate::resilience::backoff::watch_backoff;
use crate::store::etcd::{EtcdClient, WatchOutcome};

/// Token telling the reconcile loop that the tree may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Store index of the change, when known.
    pub index: Option<u64>,
}

/// Watches a prefix and feeds change notifications to the reconcile loop.
pub struct StoreWatcher {
    client: EtcdClient,
    prefix: String,
    config: WatchConfig,
    tx: mpsc::Sender<ChangeNotification>,
    wait_index: Option<u64>,
}

impl StoreWatcher {
    /// Create a new StoreWatcher.
    ///
    /// Returns the watcher and the receiving end of its notification stream.
    pub fn new(
        client: EtcdClient,
        prefix: impl Into<String>,
        config: WatchConfig,
    ) -> (Self, mpsc::Receiver<ChangeNotification>) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        (
            Self {
                client,
                prefix: prefix.into(),
                config,
                tx,
                wait_index: None,
            },
            rx,
        )
    }

    /// Start watching in a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Pin the first long-poll to the store's current index, then spawn.
    ///
    /// Must complete before the initial snapshot is read. If the index cannot
    /// be read the watch starts from "now".
    pub async fn start(mut self) -> JoinHandle<()> {
        match self.client.current_index(&self.prefix).await {
            Ok(index) => {
                tracing::debug!(index, "Watch pinned to store index");
                self.wait_index = Some(index + 1);
            }
            Err(e) => tracing::warn!(error = %e, "Could not read store index, watching from now"),
        }
        self.spawn()
    }

    /// Watch until the consumer goes away or the store stays unreachable.
    pub async fn run(self) {
        tracing::info!(
            store = %self.client.base(),
            prefix = %self.prefix,
            "Store watcher started"
        );

        let mut wait_index = self.wait_index;
        let mut failures: u32 = 0;

        while !self.tx.is_closed() {
            let notification = match self.client.wait(&self.prefix, wait_index).await {
                Ok(WatchOutcome::Changed { modified_index }) => {
                    failures = 0;
                    wait_index = Some(modified_index + 1);
                    Some(ChangeNotification {
                        index: Some(modified_index),
                    })
                }
                Ok(WatchOutcome::IndexCleared { current_index }) => {
                    // Events between wait_index and current_index are gone; a
                    // refetch covers whatever they were.
                    failures = 0;
                    tracing::warn!(current_index, "Watch index cleared, resynchronizing");
                    wait_index = Some(current_index + 1);
                    Some(ChangeNotification { index: None })
                }
                Ok(WatchOutcome::TimedOut) => {
                    failures = 0;
                    None
                }
                Err(e) => {
                    failures += 1;
                    metrics::record_watch_error();
                    if failures >= self.config.max_consecutive_failures {
                        tracing::error!(
                            error = %e,
                            failures,
                            "Watch failed too many times, closing change stream"
                        );
                        return;
                    }
                    let delay = watch_backoff(failures, &self.config);
                    tracing::warn!(error = %e, failures, delay_ms = delay.as_millis() as u64, "Watch error, retrying");
                    tokio::time::sleep(delay).await;
                    None
                }
            };

            if let Some(notification) = notification {
                match self.tx.try_send(notification) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!("Reconcile already pending, coalescing notification");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }

        tracing::info!("Change stream consumer gone, stopping watcher");
    }
}
