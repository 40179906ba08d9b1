//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vcl_sync_cycles_total` (counter): reconciliation cycles by outcome
//! - `vcl_sync_reloads_total` (counter): reload attempts by result
//! - `vcl_sync_reload_duration_seconds` (histogram): load + use latency
//! - `vcl_sync_backends` (gauge): backends per director after each parse
//! - `vcl_sync_watch_errors_total` (counter): failed watch long-polls
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::model::Definition;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one finished reconciliation cycle.
pub fn record_cycle(outcome: &'static str) {
    metrics::counter!("vcl_sync_cycles_total", "outcome" => outcome).increment(1);
}

/// Count one reload attempt and its duration.
pub fn record_reload(result: &'static str, started: Instant) {
    metrics::counter!("vcl_sync_reloads_total", "result" => result).increment(1);
    metrics::histogram!("vcl_sync_reload_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Publish per-director backend counts.
pub fn record_definition(def: &Definition) {
    metrics::gauge!("vcl_sync_hosts").set(def.hosts.len() as f64);
    for director in def.directors.values() {
        metrics::gauge!("vcl_sync_backends", "director" => director.name.clone())
            .set(director.backends.len() as f64);
    }
}

/// Count one failed watch request.
pub fn record_watch_error() {
    metrics::counter!("vcl_sync_watch_errors_total").increment(1);
}
