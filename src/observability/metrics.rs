//! Metrics collection and exposition.
//!
//! # Metrics
//! - `metadata_lookups_total` (counter): lookups by outcome (hit, miss)
//! - `metadata_updates_total` (counter): updates applied by kind (merge, raw)
//! - `metadata_store_keys` (gauge): keys currently held
//! - `metadata_forward_requests_total` (counter): forwarded requests by status
//! - `metadata_forward_duration_seconds` (histogram): upstream latency
//! - `metadata_listener_events_total` (counter): listener start/stop/fault
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_lookup(outcome: &'static str) {
    counter!("metadata_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_update(kind: &'static str) {
    counter!("metadata_updates_total", "kind" => kind).increment(1);
}

pub fn record_store_size(keys: usize) {
    gauge!("metadata_store_keys").set(keys as f64);
}

pub fn record_forward(status: u16, start: Instant) {
    counter!("metadata_forward_requests_total", "status" => status.to_string()).increment(1);
    histogram!("metadata_forward_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_listener_event(protocol: &'static str, event: &'static str) {
    counter!("metadata_listener_events_total", "protocol" => protocol, "event" => event)
        .increment(1);
}
