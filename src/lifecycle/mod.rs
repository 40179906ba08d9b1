//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → store address → templates → wire subsystems
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop between cycles
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, templates next, store traffic last
//! - Startup errors are fatal; runtime errors are logged and survived

pub mod signals;
pub mod startup;

pub use signals::shutdown_signal;
pub use startup::{prepare, Daemon, StartupError};
