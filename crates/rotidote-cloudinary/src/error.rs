//! Cloudinary client error types.

use thiserror::Error;

pub type CloudinaryResult<T> = Result<T, CloudinaryError>;

#[derive(Debug, Error)]
pub enum CloudinaryError {
    #[error("Cloudinary is not configured: {0}")]
    Config(String),

    #[error("Cloudinary request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("No secure URL returned")]
    MissingUrl,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
