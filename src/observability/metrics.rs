//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ssr_requests_total` (counter): tier results by tier, handler, rendering mode, status
//! - `ssr_request_duration_seconds` (histogram): tier fetch latency
//! - `ssr_cache_writes_total` (counter): cache writes by tier and outcome
//! - `ssr_refresh_total` (counter): background refresh attempts
//! - `ssr_tag_operations_total` (counter): tag counter operations by kind

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_tier_result(tier: &'static str, handler: &str, mode: &str, status: u16, duration: Duration) {
    metrics::counter!(
        "ssr_requests_total",
        "tier" => tier,
        "handler" => handler.to_string(),
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("ssr_request_duration_seconds", "tier" => tier).record(duration.as_secs_f64());
}

pub fn record_cache_write(tier: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!("ssr_cache_writes_total", "tier" => tier, "outcome" => outcome).increment(1);
}

pub fn record_refresh(attempt: usize) {
    metrics::counter!("ssr_refresh_total", "attempt" => attempt.to_string()).increment(1);
}

pub fn record_tag_operation(operation: &'static str) {
    metrics::counter!("ssr_tag_operations_total", "operation" => operation).increment(1);
}
