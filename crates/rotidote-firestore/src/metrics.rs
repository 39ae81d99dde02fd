//! Firestore metrics collection.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "rotidote_firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "rotidote_firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "rotidote_firestore_latency_seconds";

    /// Optimistic-concurrency conflicts on counter updates.
    pub const PRECONDITION_CONFLICTS_TOTAL: &str = "rotidote_firestore_precondition_conflicts_total";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_precondition_conflict(collection: &str) {
    counter!(
        names::PRECONDITION_CONFLICTS_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            names::REQUESTS_TOTAL,
            names::RETRIES_TOTAL,
            names::LATENCY_SECONDS,
            names::PRECONDITION_CONFLICTS_TOTAL,
        ] {
            assert!(name.starts_with("rotidote_firestore_"));
        }
    }
}
