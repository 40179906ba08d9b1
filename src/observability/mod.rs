//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (logging.rs installs the sink)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Components log through `tracing` macros only; the subscriber is chosen
//!   by the binary
//! - Metrics are dropped silently when no exporter is installed

pub mod logging;
pub mod metrics;
