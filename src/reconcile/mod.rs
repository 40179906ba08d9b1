//! Reconciliation loop.
//!
//! # State Machine
//! ```text
//! Initializing (once, at startup):
//!     fetch → parse → render → reload, unconditionally
//!     baseline recorded only if everything succeeded
//!     → Watching
//!
//! Watching (until the change stream closes):
//!     notification → fetch → parse
//!     → diff against recorded Definition
//!     → render + reload only when changed
//!     → record the new Definition (absent if the fetch failed)
//!
//! Stream closed → ReconcileError::StreamClosed (fatal)
//! ```
//!
//! # Design Decisions
//! - One notification is handled at a time; reloads never interleave
//! - The recorded Definition is owned here and nowhere else
//! - Failed cycles are not retried; the next notification is the retry

use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::StoreConfig;
use crate::model::{self, Definition};
use crate::observability::metrics;
use crate::reload::{CommandRunner, Orchestrator, RevisionTag};
use crate::render::Renderer;
use crate::store::{ChangeNotification, StoreError, TreeSource};

/// Fatal loop errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store watch loop closed")]
    StreamClosed,
}

/// A snapshot could not be read.
#[derive(Debug, Error)]
#[error("reading {key} from store: {source}")]
pub struct FetchError {
    pub key: String,
    #[source]
    pub source: StoreError,
}

/// What one reconciliation cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Artifacts written and activated under this revision.
    Applied(RevisionTag),
    /// Parsed model matched the recorded one.
    Unchanged,
    FetchFailed,
    RenderFailed,
    ReloadFailed,
}

impl CycleOutcome {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Applied(_) => "applied",
            CycleOutcome::Unchanged => "unchanged",
            CycleOutcome::FetchFailed => "fetch_failed",
            CycleOutcome::RenderFailed => "render_failed",
            CycleOutcome::ReloadFailed => "reload_failed",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, CycleOutcome::Applied(_))
    }
}

/// Keeps the proxy in sync with the store.
pub struct Reconciler<S, R> {
    source: S,
    hosts_key: String,
    upstreams_key: String,
    renderer: Renderer,
    orchestrator: Orchestrator<R>,
    recorded: Option<Definition>,
}

impl<S: TreeSource, R: CommandRunner> Reconciler<S, R> {
    pub fn new(source: S, store: &StoreConfig, renderer: Renderer, orchestrator: Orchestrator<R>) -> Self {
        Self {
            source,
            hosts_key: store.hosts_key(),
            upstreams_key: store.upstreams_key(),
            renderer,
            orchestrator,
            recorded: None,
        }
    }

    /// The Definition the next notification is compared against.
    pub fn recorded(&self) -> Option<&Definition> {
        self.recorded.as_ref()
    }

    async fn fetch(&self) -> Result<Definition, FetchError> {
        let hosts = self.source.fetch(&self.hosts_key).await.map_err(|source| FetchError {
            key: self.hosts_key.clone(),
            source,
        })?;
        let upstreams = self
            .source
            .fetch(&self.upstreams_key)
            .await
            .map_err(|source| FetchError {
                key: self.upstreams_key.clone(),
                source,
            })?;

        let def = model::parse(&hosts, &upstreams);
        metrics::record_definition(&def);
        Ok(def)
    }

    async fn apply(&mut self, def: &Definition) -> CycleOutcome {
        if let Err(e) = self.renderer.write(def) {
            tracing::error!(error = %e, "Writing artifacts failed, reload skipped");
            return CycleOutcome::RenderFailed;
        }

        match self.orchestrator.activate().await {
            Ok(tag) => CycleOutcome::Applied(tag),
            Err(e) => {
                tracing::error!(error = %e, "Reloading proxy failed");
                CycleOutcome::ReloadFailed
            }
        }
    }

    /// Initial full sync. Records a baseline only when it fully applied.
    pub async fn initialize(&mut self) -> CycleOutcome {
        let outcome = match self.fetch().await {
            Ok(def) => {
                let outcome = self.apply(&def).await;
                self.recorded = outcome.is_applied().then_some(def);
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "Initial sync failed");
                self.recorded = None;
                CycleOutcome::FetchFailed
            }
        };

        metrics::record_cycle(outcome.label());
        outcome
    }

    /// One Watching cycle.
    pub async fn handle_notification(&mut self) -> CycleOutcome {
        let outcome = match self.fetch().await {
            Ok(def) => {
                let outcome = match model::diff(&def, self.recorded.as_ref()) {
                    Some(change) => {
                        tracing::info!(change = %change, "Change detected...");
                        self.apply(&def).await
                    }
                    None => {
                        tracing::debug!("No material change");
                        CycleOutcome::Unchanged
                    }
                };
                self.recorded = Some(def);
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync cycle abandoned");
                self.recorded = None;
                CycleOutcome::FetchFailed
            }
        };

        metrics::record_cycle(outcome.label());
        outcome
    }

    /// Initial sync, then one cycle per notification until the stream closes.
    pub async fn run(mut self, mut notifications: mpsc::Receiver<ChangeNotification>) -> Result<Infallible, ReconcileError> {
        let outcome = self.initialize().await;
        tracing::info!(outcome = outcome.label(), "Initial sync finished");

        while let Some(notification) = notifications.recv().await {
            tracing::debug!(index = ?notification.index, "Store change notification");
            self.handle_notification().await;
        }

        Err(ReconcileError::StreamClosed)
    }
}
