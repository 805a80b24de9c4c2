//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (pool requests, send latency, reply results)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-pool and per-operation metrics
//!
//! # Metrics
//! - `cache_proxy_pool_requests_total` (counter): physical sends by pool
//! - `cache_proxy_pool_duration_us` (histogram): per-send latency by pool
//! - `cache_proxy_pool_final_errors_total` (counter): logical requests that
//!   finished with an error result, by pool
//! - `cache_proxy_pool_total_duration_us` (histogram): logical request latency
//! - `cache_proxy_replies_total` (counter): replies by operation, result, class
//! - `cache_proxy_reply_duration_us` (histogram): reply latency by operation
//! - `cache_proxy_config_reloads_total` (counter): reloads by outcome
//! - `cache_proxy_config_generation` (gauge): active routing generation
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op (tests, embedding)
//! - Labels are low-cardinality: pool, operation, result, class

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_pool_requests(pool: &str, n: u64) {
    metrics::counter!("cache_proxy_pool_requests_total", "pool" => pool.to_string()).increment(n);
}

pub fn record_pool_duration(pool: &str, duration_us: i64) {
    metrics::histogram!("cache_proxy_pool_duration_us", "pool" => pool.to_string())
        .record(duration_us as f64);
}

pub fn record_pool_final_errors(pool: &str, n: u64) {
    metrics::counter!("cache_proxy_pool_final_errors_total", "pool" => pool.to_string())
        .increment(n);
}

pub fn record_pool_total_duration(pool: &str, duration_us: i64) {
    metrics::histogram!("cache_proxy_pool_total_duration_us", "pool" => pool.to_string())
        .record(duration_us as f64);
}

pub fn record_reply(operation: &'static str, result: &'static str, class: &'static str, duration_us: i64) {
    metrics::counter!(
        "cache_proxy_replies_total",
        "operation" => operation,
        "result" => result,
        "class" => class
    )
    .increment(1);
    metrics::histogram!("cache_proxy_reply_duration_us", "operation" => operation)
        .record(duration_us as f64);
}

pub fn record_config_reload(success: bool, generation: u64) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("cache_proxy_config_reloads_total", "outcome" => outcome).increment(1);
    if success {
        metrics::gauge!("cache_proxy_config_generation").set(generation as f64);
    }
}
