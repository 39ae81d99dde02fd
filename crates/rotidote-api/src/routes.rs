//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    create_upload, dislike_video, get_asset, get_profile, get_video, health, like_video, list_my_videos,
    list_public_videos, not_found, ready, refresh_video, root, update_profile, upload_thumbnail, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, redact_server_errors, request_id, request_logging, security_headers,
    ClientRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let max_json_body = state.config.max_json_body;
    let upload_body_limit = state.config.upload_body_limit();

    // Routes taking a JSON body
    let json_routes = Router::new()
        .route("/create-upload", post(create_upload))
        .route("/users/me", get(get_profile).put(update_profile))
        .layer(DefaultBodyLimit::max(max_json_body))
        .layer(RequestBodyLimitLayer::new(max_json_body));

    // Multipart uploads: up to three files plus form fields
    let upload_routes = Router::new()
        .route("/upload-video", post(upload_video))
        .route("/upload-thumbnail", post(upload_thumbnail))
        .layer(DefaultBodyLimit::max(upload_body_limit))
        .layer(RequestBodyLimitLayer::new(upload_body_limit));

    let video_routes = Router::new()
        .route("/asset/:asset_id", get(get_asset))
        .route("/videos", get(list_my_videos))
        .route("/videos/public", get(list_public_videos))
        .route("/videos/:video_id", get(get_video))
        .route("/videos/:video_id/like", post(like_video))
        .route("/videos/:video_id/dislike", post(dislike_video))
        .route("/videos/:video_id/refresh", post(refresh_video))
        .layer(RequestBodyLimitLayer::new(max_json_body));

    let rate_limiter = Arc::new(ClientRateLimiter::new(
        state.config.rate_limit_max,
        state.config.rate_limit_window,
        state.config.trust_proxy,
    ));

    let api_routes = Router::new()
        .route("/", get(root))
        .merge(json_routes)
        .merge(upload_routes)
        .merge(video_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), redact_server_errors))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
