//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "rotidote_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "rotidote_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "rotidote_http_requests_in_flight";

    // Upload pipeline metrics
    pub const UPLOAD_STAGE_DURATION_SECONDS: &str = "rotidote_upload_stage_duration_seconds";
    pub const UPLOADS_TOTAL: &str = "rotidote_uploads_total";

    pub const REACTIONS_TOTAL: &str = "rotidote_reactions_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "rotidote_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how long one upload pipeline stage took.
pub fn record_upload_stage(stage: &str, success: bool, duration_secs: f64) {
    let labels = [
        ("stage", stage.to_string()),
        ("success", success.to_string()),
    ];
    histogram!(names::UPLOAD_STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished upload; `outcome` is "success" or the failing stage.
pub fn record_upload_outcome(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

pub fn record_reaction(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::REACTIONS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Route template for the label, so ids don't explode cardinality.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_requests_share_one_label() {
        let request = Request::builder()
            .uri("/videos/abc123/like")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "unmatched");
    }
}
