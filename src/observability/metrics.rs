//! Metrics collection and exposition.
//!
//! # Metrics
//! - `strip_prefix_requests_total` (counter): requests by outcome
//!   (`stripped`, `not_found`) and matched prefix
//! - `strip_prefix_upstream_requests_total` (counter): forwarded requests by
//!   upstream status (`error` when the upstream was unreachable)
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_stripped(prefix: &str) {
    ::metrics::counter!(
        "strip_prefix_requests_total",
        "outcome" => "stripped",
        "prefix" => prefix.to_string()
    )
    .increment(1);
}

pub fn record_not_found() {
    ::metrics::counter!("strip_prefix_requests_total", "outcome" => "not_found").increment(1);
}

pub fn record_upstream(status: Option<u16>) {
    let status = status.map_or_else(|| "error".to_string(), |s| s.to_string());
    ::metrics::counter!("strip_prefix_upstream_requests_total", "status" => status).increment(1);
}
