//! Key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot fetch (etcd.rs):
//!     GET <prefix>/hosts, GET <prefix>/upstreams (recursive, sorted)
//!     → TreeNode snapshots
//!     → model::parser
//!
//! Change stream (watcher.rs):
//!     long-poll watch on <prefix>
//!     → ChangeNotification tokens
//!     → mpsc channel
//!     → reconcile loop (sole consumer)
//! ```
//!
//! # Design Decisions
//! - Snapshots are plain owned trees, independent of the transport
//! - The loop only sees the `TreeSource` trait, so tests feed it canned trees
//! - Notifications carry no payload; the loop always re-fetches

pub mod etcd;
pub mod node;
pub mod watcher;

use std::future::Future;
use thiserror::Error;

pub use etcd::EtcdClient;
pub use node::TreeNode;
pub use watcher::{ChangeNotification, StoreWatcher};

/// Errors raised while talking to the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connection refused, reset, ...).
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The requested key does not exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The store answered with an unexpected status.
    #[error("store returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("invalid store response: {0}")]
    Decode(String),
}

/// Source of tree snapshots.
///
/// Implemented by [`EtcdClient`]; tests provide in-memory fakes.
pub trait TreeSource {
    /// Fetch the full subtree rooted at `key`.
    fn fetch(&self, key: &str) -> impl Future<Output = Result<TreeNode, StoreError>> + Send;
}
