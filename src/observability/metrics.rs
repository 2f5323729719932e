//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (outcomes, latency, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `router_dispatch_total` (counter): dispatched requests by outcome
//! - `router_dispatch_duration_seconds` (histogram): traversal latency
//! - `router_reloads_total` (counter): config reloads by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Low-overhead metric updates (atomic operations)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::Dispatch;

pub const DISPATCH_TOTAL: &str = "router_dispatch_total";
pub const DISPATCH_DURATION: &str = "router_dispatch_duration_seconds";
pub const RELOADS_TOTAL: &str = "router_reloads_total";

/// Install the Prometheus exporter listening on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished dispatch.
pub fn record_dispatch(dispatch: Dispatch, start: Instant) {
    metrics::counter!(DISPATCH_TOTAL, "outcome" => dispatch.as_str()).increment(1);
    metrics::histogram!(DISPATCH_DURATION).record(start.elapsed().as_secs_f64());
}

/// Record a config reload attempt.
pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "rejected" };
    metrics::counter!(RELOADS_TOTAL, "result" => result).increment(1);
}
