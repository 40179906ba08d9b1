//! vcl-sync: keeps Varnish routing in sync with an etcd tree.
//!
//! Hosts, path rules and upstream endpoints stored under a watched prefix are
//! parsed into a [`model::Definition`], rendered into two VCL files and
//! activated on the running proxy with a load-then-use revision switch.

// Pipeline
pub mod model;
pub mod reconcile;
pub mod reload;
pub mod render;
pub mod store;

// Cross-cutting concerns
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::SyncConfig;
pub use model::Definition;
pub use reconcile::{CycleOutcome, Reconciler};
