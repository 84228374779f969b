//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Ingestion metrics
    describe_counter!("corral_reports_ingested_total", "Total agent reports accepted");
    describe_counter!(
        "corral_reports_rejected_total",
        "Total agent reports rejected (by reason)"
    );

    // Storage metrics
    describe_counter!("corral_db_errors_total", "Total database failures (by operation)");

    // Retention metrics
    describe_counter!(
        "corral_retention_deleted_total",
        "Total samples removed by retention pruning"
    );

    // API metrics
    describe_counter!(
        "corral_api_requests_total",
        "Total API requests (by endpoint, status)"
    );
    describe_histogram!(
        "corral_api_request_duration_seconds",
        "API request duration (by endpoint)"
    );
}

/// Helper functions for common metric patterns
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        "corral_api_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("corral_api_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration_secs);
}

pub fn record_report_rejected(reason: &'static str) {
    counter!("corral_reports_rejected_total", "reason" => reason).increment(1);
}
