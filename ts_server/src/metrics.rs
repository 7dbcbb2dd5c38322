//! Prometheus metrics for the session daemon.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring
//! systems when `METRICS_BIND` is set.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Sets up a Prometheus scrape endpoint on the specified address.
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

/// Set current online sessions count.
pub fn online_sessions(count: usize) {
    metrics::gauge!("turnstile_online_sessions").set(count as f64);
}

/// Add sessions removed by an expiry sweep.
pub fn sessions_expired_total(removed: usize) {
    metrics::counter!("turnstile_sessions_expired_total").increment(removed as u64);
}

/// Increment login attempts counter.
pub fn login_attempts_total(success: bool) {
    metrics::counter!("turnstile_login_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}
