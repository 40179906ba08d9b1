//! vcl-sync daemon entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────┐  notifications   ┌─────────────────────────────────────────────┐
//!   │ StoreWatcher │ ───────────────▶ │                 Reconciler                  │
//!   │ (etcd watch) │   mpsc (bounded) │                                             │
//!   └──────────────┘                  │  fetch ──▶ parse ──▶ diff ──▶ render ──▶ reload
//!          ▲                          │    │                            │          │
//!          │ long-poll                └────┼────────────────────────────┼──────────┼──┘
//!          │                               ▼                            ▼          ▼
//!   ┌──────┴───────┐                 ┌──────────┐                ┌──────────┐ ┌──────────┐
//!   │   etcd v2    │ ◀────────────── │EtcdClient│                │ VCL files│ │varnishadm│
//!   └──────────────┘    snapshots    └──────────┘                └──────────┘ └──────────┘
//! ```

use clap::Parser;

use vcl_sync::cli::Cli;
use vcl_sync::lifecycle::{prepare, shutdown_signal, Daemon};
use vcl_sync::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    logging::init(&config.observability.log_level);
    tracing::info!("vcl-sync v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let Daemon {
        mut reconciler,
        watcher,
        notifications,
    } = prepare(&config)?;

    if cli.once {
        let outcome = reconciler.initialize().await;
        if !outcome.is_applied() {
            return Err(format!("sync did not apply: {}", outcome.label()).into());
        }
        tracing::info!("Sync complete");
        return Ok(());
    }

    let _watch = watcher.start().await;
    tracing::info!(
        store = %config.store.address,
        prefix = %config.store.prefix,
        "Listening for store events..."
    );

    tokio::select! {
        result = reconciler.run(notifications) => match result {
            Ok(never) => match never {},
            Err(e) => {
                tracing::error!(error = %e, "Reconcile loop stopped");
                return Err(e.into());
            }
        },
        signal = shutdown_signal() => {
            tracing::info!(signal, "Shutdown signal received");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
