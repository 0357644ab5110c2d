//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_requests_total` (counter): requests by outcome
//! - `config_request_duration_seconds` (histogram): end-to-end latency
//! - `config_reloads_total` (counter): reloads by target and result
//! - `config_products` (gauge): products currently held by the store
//! - `allowlist_entries` (gauge): size of the allow-list
//! - `rate_limiters_tracked` (gauge): identities with a live limiter
//! - `rate_limiters_evicted_total` (counter): limiters dropped for idleness

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("config_requests_total", "outcome" => outcome).increment(1);
    histogram!("config_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_reload(target: &'static str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("config_reloads_total", "target" => target, "result" => result).increment(1);
}

pub fn record_products(count: usize) {
    gauge!("config_products").set(count as f64);
}

pub fn record_allowlist_size(count: usize) {
    gauge!("allowlist_entries").set(count as f64);
}

pub fn record_limiters(tracked: usize, evicted: usize) {
    gauge!("rate_limiters_tracked").set(tracked as f64);
    counter!("rate_limiters_evicted_total").increment(evicted as u64);
}
