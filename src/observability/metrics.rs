//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_upstream_duration_seconds` (histogram): per-attempt upstream
//!   call latency by service
//! - `gateway_upstream_retries_total` (counter): retry attempts by service
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//! - `gateway_circuit_transitions_total` (counter): breaker transitions by
//!   service and target state
//! - `gateway_circuit_rejections_total` (counter): calls failed fast while open

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
///
/// Failure to install is logged, not fatal; the gateway serves traffic
/// without metrics rather than refusing to start.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed inbound request.
pub fn record_request(method: &str, status: u16, service: &str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "service" => service.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record the wall-clock duration of one upstream call attempt.
pub fn record_upstream_attempt(service: &str, started: Instant) {
    histogram!(
        "gateway_upstream_duration_seconds",
        "service" => service.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record a retry of an upstream attempt.
pub fn record_retry(service: &str) {
    counter!("gateway_upstream_retries_total", "service" => service.to_string()).increment(1);
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

/// Record a breaker state transition.
pub fn record_circuit_transition(service: &str, to: &'static str) {
    counter!(
        "gateway_circuit_transitions_total",
        "service" => service.to_string(),
        "to" => to
    )
    .increment(1);
}

/// Record a call failed fast because the circuit was open.
pub fn record_circuit_rejection(service: &str) {
    counter!("gateway_circuit_rejections_total", "service" => service.to_string()).increment(1);
}
