//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relayed requests by method, status
//! - `relay_request_duration_seconds` (histogram): end-to-end relay latency
//! - `relay_upstream_errors_total` (counter): failures by kind
//!
//! Recording through the `metrics` facade is a no-op until an exporter is
//! installed, so handlers record unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record one relayed request and its latency.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a relay failure by kind (`unreachable`, `status`, `body`).
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("relay_upstream_errors_total", "kind" => kind).increment(1);
}
