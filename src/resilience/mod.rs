//! Resilience patterns.
//!
//! Only the watch stream reconnects automatically; reconciliation cycles are
//! never retried, they wait for the next change notification instead.

pub mod backoff;
