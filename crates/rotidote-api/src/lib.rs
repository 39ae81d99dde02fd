//! Axum HTTP API server.
//!
//! This crate provides:
//! - The video upload pipeline (Mux + Cloudinary + Firestore)
//! - Video feeds, reactions and user profiles
//! - Firebase ID token verification
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::UploadPipeline;
pub use state::AppState;
