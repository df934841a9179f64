//! Metrics collection and exposition.
//!
//! # Metrics
//! - `payment_router_payments_total` (counter): terminal outcomes by status, kind
//! - `payment_router_payment_duration_seconds` (histogram): time to terminal outcome
//! - `payment_router_endpoint_probe_failures_total` (counter): failed probes by endpoint
//! - `payment_router_endpoint_rotations_total` (counter): nonce-conflict rotations
//! - `payment_router_delay_retries_total` (counter): delay-retries by error kind
//! - `payment_router_batch_size` (histogram): items per batch
//!
//! Without an installed recorder every call is a no-op, which keeps tests quiet.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a terminal payment outcome.
pub fn record_payment(status: &'static str, kind: &'static str, started: Instant) {
    counter!("payment_router_payments_total", "status" => status, "kind" => kind).increment(1);
    histogram!("payment_router_payment_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record a failed liveness probe.
pub fn record_probe_failure(endpoint: &str) {
    counter!("payment_router_endpoint_probe_failures_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

/// Record an endpoint rotation caused by a nonce conflict.
pub fn record_rotation() {
    counter!("payment_router_endpoint_rotations_total").increment(1);
}

/// Record a delay-retry after a failed attempt.
pub fn record_delay_retry(kind: &'static str) {
    counter!("payment_router_delay_retries_total", "kind" => kind).increment(1);
}

/// Record the size of a dispatched batch.
pub fn record_batch(size: usize) {
    histogram!("payment_router_batch_size").record(size as f64);
}
