//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by outcome (`passed`, `validated`, `rejected`)
//! - `gate_rejections_total` (counter): failing locations by name
//! - `gate_request_duration_seconds` (histogram): time spent validating a matched request
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - The Prometheus scrape endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::compiler::Location;

/// Install the Prometheus recorder with its own HTTP listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_outcome(outcome: &'static str) {
    ::metrics::counter!("gate_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_rejection(location: Location) {
    ::metrics::counter!("gate_rejections_total", "location" => location.as_str()).increment(1);
}

pub fn record_duration(start: Instant) {
    ::metrics::histogram!("gate_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
