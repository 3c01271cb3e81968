//! Metrics definitions for the focus controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `focus_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used to
/// render the scrape output.
///
/// Allocation buckets span the default 15s reply timeout.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("focus_colibri_allocate".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                15.000,
            ],
        )
        .map_err(|e| format!("Failed to set allocation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Count one colibri request.
///
/// Metric: `focus_colibri_requests_total`
/// Labels: `operation`, `outcome`
///
/// Cardinality: 9 operations x 4 outcomes
pub fn record_colibri_request(operation: &'static str, outcome: &'static str) {
    counter!(
        "focus_colibri_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the round trip of an allocation request, successful or not.
///
/// Metric: `focus_colibri_allocate_duration_seconds`
pub fn record_allocate_duration(duration: Duration) {
    histogram!("focus_colibri_allocate_duration_seconds").record(duration.as_secs_f64());
}

/// Set the number of operational bridges.
///
/// Metric: `focus_bridges_operational`
pub fn set_bridges_operational(count: usize) {
    // usize to f64 conversion is safe for realistic bridge counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("focus_bridges_operational").set(count as f64);
}
