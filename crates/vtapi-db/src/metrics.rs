//! Job repository metrics.
//!
//! - Operation counters by operation and outcome
//! - Latency histograms
//! - Index entries skipped while listing

use metrics::{counter, histogram};

use crate::error::{DbError, DbResult};

/// Metric name constants for consistency.
pub mod names {
    /// Total repository operations by operation and status.
    pub const OPERATIONS_TOTAL: &str = "job_repository_operations_total";

    /// Operation latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "job_repository_latency_seconds";

    /// Index members skipped during listing because no decodable record backs them.
    pub const INDEX_SKIPPED_TOTAL: &str = "job_repository_index_skipped_total";
}

/// Status label for an operation outcome.
pub fn status_label<T>(result: &DbResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(DbError::InvalidJob(_)) => "invalid",
        Err(DbError::JobNotFound) => "not_found",
        Err(DbError::TransactionConflict(_)) => "conflict",
        Err(DbError::CorruptRecord { .. }) => "corrupt",
        Err(DbError::BackendUnavailable(_)) => "unavailable",
        Err(DbError::Configuration(_)) => "configuration",
        Err(DbError::Redis(_)) => "error",
    }
}

/// Record metrics for a completed repository operation.
pub fn record_operation(operation: &'static str, status: &'static str, latency_secs: f64) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation,
        "status" => status
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation
    )
    .record(latency_secs);
}

/// Record an index member that was skipped while listing.
pub fn record_index_skip() {
    counter!(names::INDEX_SKIPPED_TOTAL).increment(1);
}
