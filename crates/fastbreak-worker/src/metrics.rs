//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: &str) -> WorkerResult<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| WorkerError::config_error(format!("invalid METRICS_ADDR '{}': {}", addr, e)))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("failed to install metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "fastbreak_frames_processed_total";
    pub const FRAME_DURATION_SECONDS: &str = "fastbreak_frame_duration_seconds";
    pub const DETECTION_TIMEOUTS_TOTAL: &str = "fastbreak_detection_timeouts_total";
    pub const FRAME_FAILURES_TOTAL: &str = "fastbreak_frame_failures_total";

    pub const PASSES_TOTAL: &str = "fastbreak_passes_total";
    pub const SEQUENCES_RESET_TOTAL: &str = "fastbreak_sequences_reset_total";
    pub const FAST_BREAKS_TOTAL: &str = "fastbreak_fast_breaks_total";
    pub const STORAGE_FAILURES_TOTAL: &str = "fastbreak_storage_failures_total";

    pub const MATCHES_FINISHED_TOTAL: &str = "fastbreak_matches_finished_total";
}

/// Record a processed frame and its processing latency.
pub fn record_frame_processed(duration_secs: f64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
    histogram!(names::FRAME_DURATION_SECONDS).record(duration_secs);
}

pub fn record_detection_timeout() {
    counter!(names::DETECTION_TIMEOUTS_TOTAL).increment(1);
}

/// Record a frame that failed and was treated as empty.
pub fn record_frame_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::FRAME_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_pass(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::PASSES_TOTAL, &labels).increment(1);
}

pub fn record_sequences_reset(count: u64) {
    if count > 0 {
        counter!(names::SEQUENCES_RESET_TOTAL).increment(count);
    }
}

pub fn record_fast_break(rule: &str) {
    let labels = [("rule", rule.to_string())];
    counter!(names::FAST_BREAKS_TOTAL, &labels).increment(1);
}

pub fn record_storage_failure(sink: &str) {
    let labels = [("sink", sink.to_string())];
    counter!(names::STORAGE_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_match_finished(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::MATCHES_FINISHED_TOTAL, &labels).increment(1);
}
