//! Startup orchestration.
//!
//! # Responsibilities
//! - Parse the store address and compile templates (fatal on failure)
//! - Wire store client, renderer, orchestrator and watcher together
//!
//! # Design Decisions
//! - Fail fast: nothing talks to the store or the proxy until every
//!   startup check passed
//! - The watcher is built here but started by the caller (`StoreWatcher::start`),
//!   which pins it to the store index before the initial sync reads

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::validation::{parse_store_address, ValidationError};
use crate::config::SyncConfig;
use crate::reconcile::Reconciler;
use crate::reload::{Orchestrator, ProcessRunner};
use crate::render::{Renderer, TemplateError};
use crate::store::{ChangeNotification, EtcdClient, StoreWatcher};

/// Errors that abort the process before any reconciliation.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    StoreAddress(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Everything the daemon needs to run.
pub struct Daemon {
    pub reconciler: Reconciler<EtcdClient, ProcessRunner>,
    pub watcher: StoreWatcher,
    pub notifications: mpsc::Receiver<ChangeNotification>,
}

/// Build the daemon from a validated configuration.
pub fn prepare(config: &SyncConfig) -> Result<Daemon, StartupError> {
    let store_url = parse_store_address(&config.store.address)?;
    let renderer = Renderer::from_config(&config.render)?;

    tracing::info!(
        template_dir = %config.render.template_dir.display(),
        "Templates compiled"
    );

    let client = EtcdClient::new(store_url);
    let orchestrator = Orchestrator::new(ProcessRunner, &config.reload, renderer.routing_path());
    let (watcher, notifications) =
        StoreWatcher::new(client.clone(), config.store.prefix.clone(), config.watch.clone());
    let reconciler = Reconciler::new(client, &config.store, renderer, orchestrator);

    Ok(Daemon {
        reconciler,
        watcher,
        notifications,
    })
}
