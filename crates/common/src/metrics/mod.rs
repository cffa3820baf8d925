//! Metrics and observability utilities
//!
//! Prometheus metrics for the trigger endpoints and the scan pipeline,
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::{Duration, Instant};

use crate::models::SourceKind;

/// Metrics prefix for all PaperScout metrics
pub const METRICS_PREFIX: &str = "paperscout";

/// Buckets for scan duration (keyword loops with 1s spacing, or a long subprocess)
pub const SCAN_BUCKETS: &[f64] = &[
    1.0,    // 1s
    5.0,    // 5s
    10.0,   // 10s
    30.0,   // 30s
    60.0,   // 1m
    120.0,  // 2m
    300.0,  // 5m
    600.0,  // 10m - subprocess budget
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Scan metrics
    describe_counter!(
        format!("{}_scans_total", METRICS_PREFIX),
        Unit::Count,
        "Scans by source kind and outcome"
    );

    describe_histogram!(
        format!("{}_scan_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end scan latency in seconds"
    );

    describe_counter!(
        format!("{}_discoveries_new_total", METRICS_PREFIX),
        Unit::Count,
        "New discoveries persisted"
    );

    describe_gauge!(
        format!("{}_discoveries_stored", METRICS_PREFIX),
        Unit::Count,
        "Discoveries in the store after the last merge"
    );

    // Source metrics
    describe_counter!(
        format!("{}_source_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound provider requests"
    );

    describe_histogram!(
        format!("{}_source_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Outbound provider request latency in seconds"
    );

    describe_counter!(
        format!("{}_entries_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Feed entries dropped for missing id or title"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the outcome of one scan. `new_discoveries` is `None` on failure.
pub fn record_scan(kind: SourceKind, elapsed: Duration, new_discoveries: Option<usize>) {
    let outcome = if new_discoveries.is_some() { "success" } else { "error" };

    counter!(
        format!("{}_scans_total", METRICS_PREFIX),
        "source" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_scan_duration_seconds", METRICS_PREFIX),
        "source" => kind.as_str()
    )
    .record(elapsed.as_secs_f64());

    if let Some(count) = new_discoveries {
        counter!(
            format!("{}_discoveries_new_total", METRICS_PREFIX),
            "source" => kind.as_str()
        )
        .increment(count as u64);
    }
}

/// Record the stored total after a merge
pub fn set_discoveries_stored(total: usize) {
    gauge!(format!("{}_discoveries_stored", METRICS_PREFIX)).set(total as f64);
}

/// Helper to record provider request metrics
pub fn record_source_request(provider: &str, elapsed: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_source_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_source_request_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Count feed entries the parser had to drop
pub fn record_dropped_entries(count: usize) {
    if count > 0 {
        counter!(format!("{}_entries_dropped_total", METRICS_PREFIX)).increment(count as u64);
    }
}
