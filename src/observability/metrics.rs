//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, source
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_cache_events_total` (counter): hit, miss, store, evict, expire
//! - `proxy_cache_entries` (gauge): current cache size
//! - `proxy_rate_limited_total` (counter): rejected admissions

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request. `source` is `cache`, `upstream` or `proxy`.
pub fn record_request(method: &str, status: u16, source: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "source" => source
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "source" => source)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    counter!("proxy_cache_events_total", "event" => event).increment(1);
}

pub fn record_cache_size(size: usize) {
    gauge!("proxy_cache_entries").set(size as f64);
}

pub fn record_rate_limited() {
    counter!("proxy_rate_limited_total").increment(1);
}
