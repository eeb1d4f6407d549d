//! Prometheus metrics helpers.
//!
//! Thin wrappers so call sites stay one-liners and metric/label names stay
//! consistent across handlers.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count a finished request for an endpoint with its response status.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "streamgate_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record wall time for a request.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("streamgate_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count an unreachable origin or a non-success origin status.
pub fn record_origin_error() {
    counter!("streamgate_origin_errors_total").increment(1);
}

/// Count an applied transform: `manifest` rewrite or disguise `strip`.
pub fn record_transform(kind: &'static str) {
    counter!("streamgate_transforms_total", "kind" => kind).increment(1);
}
