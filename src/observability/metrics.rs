//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): forwarded requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): upstream round-trip latency by route
//! - `gateway_rejections_total` (counter): short-circuited requests by reason
//! - `gateway_csrf_tokens_issued_total` (counter): new anti-forgery tokens

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint and install the global recorder.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a request answered by the controller service.
pub fn record_request(method: &str, status: u16, route: &'static str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route,
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Record a request stopped by the gateway itself.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("gateway_rejections_total", "reason" => reason).increment(1);
}

/// Record a newly minted anti-forgery token.
pub fn record_csrf_issued() {
    metrics::counter!("gateway_csrf_tokens_issued_total").increment(1);
}
