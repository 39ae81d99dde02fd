//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use rotidote_cloudinary::CloudinaryError;
use rotidote_firestore::FirestoreError;
use rotidote_models::{MediaKindError, UploadStage};
use rotidote_mux::MuxError;

pub type ApiResult<T> = Result<T, ApiError>;

const INTERNAL_DETAILS_HIDDEN: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{message}: {details}")]
    Validation { message: String, details: String },

    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,

    /// A call to Mux, Cloudinary or Firestore failed.
    #[error("{summary}: {details}")]
    Upstream { summary: String, details: String },

    #[error("{stage}: {message}")]
    UploadFailed { stage: UploadStage, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn upstream(summary: impl Into<String>, details: impl ToString) -> Self {
        Self::Upstream {
            summary: summary.into(),
            details: details.to_string(),
        }
    }

    /// Replace the summary of a server-side failure, keeping client errors as they are.
    pub fn context(self, summary: &str) -> Self {
        match self {
            Self::Upstream { details, .. } | Self::Internal(details) => Self::Upstream {
                summary: summary.to_string(),
                details,
            },
            other => other,
        }
    }

    /// The most specific cause, without the summary.
    pub fn detail(&self) -> String {
        match self {
            Self::Upstream { details, .. } | Self::Internal(details) => details.clone(),
            Self::Validation { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { .. } | ApiError::UploadFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// `(error, details)` pair for the response body.
    fn body_parts(&self) -> (String, Option<String>) {
        match self {
            ApiError::Validation { message, details } => (message.clone(), Some(details.clone())),
            ApiError::Upstream { summary, details } => (summary.clone(), Some(details.clone())),
            ApiError::UploadFailed { .. } => {
                ("Failed to upload video".to_string(), Some(self.to_string()))
            }
            ApiError::Internal(details) => (INTERNAL_DETAILS_HIDDEN.to_string(), Some(details.clone())),
            other => (other.to_string(), None),
        }
    }
}

/// JSON error body. A copy rides along in the response extensions so
/// outer middleware can rewrite it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Same summary, internal details replaced.
    pub fn redacted(&self) -> Self {
        Self {
            error: self.error.clone(),
            details: self.details.as_ref().map(|_| INTERNAL_DETAILS_HIDDEN.to_string()),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        let mut response = (status, Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error, details) = self.body_parts();
        ErrorResponse { error, details }.into_response_with(status)
    }
}

impl From<FirestoreError> for ApiError {
    fn from(e: FirestoreError) -> Self {
        match e {
            FirestoreError::NotFound(path) => ApiError::NotFound(format!("Not found: {}", path)),
            other => ApiError::upstream("Database request failed", other),
        }
    }
}

impl From<MuxError> for ApiError {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::NotFound(what) => ApiError::NotFound(format!("Not found: {}", what)),
            other => ApiError::upstream("Video service request failed", other),
        }
    }
}

impl From<CloudinaryError> for ApiError {
    fn from(e: CloudinaryError) -> Self {
        ApiError::upstream("Image service request failed", e)
    }
}

impl From<MediaKindError> for ApiError {
    fn from(e: MediaKindError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
        fields.sort();
        ApiError::Validation {
            message: "Invalid profile".to_string(),
            details: format!("Each of these fields must be 1-100 characters: {}", fields.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_client_error_body_has_no_details() {
        let (status, body) = body_json(ApiError::unauthorized("Access token required")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({"error": "Access token required"}));
    }

    #[tokio::test]
    async fn test_upload_failure_names_stage() {
        let err = ApiError::UploadFailed {
            stage: UploadStage::Thumbnail,
            message: "No secure URL returned".to_string(),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to upload video");
        assert_eq!(body["details"], "thumbnail: No secure URL returned");
    }

    #[test]
    fn test_error_body_travels_in_extensions() {
        let response = ApiError::upstream("Database request failed", "deadline exceeded").into_response();
        let body = response.extensions().get::<ErrorResponse>().unwrap();
        assert_eq!(body.details.as_deref(), Some("deadline exceeded"));

        let redacted = body.redacted();
        assert_eq!(redacted.error, "Database request failed");
        assert_eq!(redacted.details.as_deref(), Some("Internal server error"));
        assert_eq!(ErrorResponse { error: "x".into(), details: None }.redacted().details, None);
    }

    #[test]
    fn test_context_only_rewrites_server_errors() {
        let err = ApiError::upstream("Video service request failed", "timeout").context("Failed to create upload URL");
        assert!(matches!(&err, ApiError::Upstream { summary, .. } if summary == "Failed to create upload URL"));
        assert_eq!(err.detail(), "timeout");

        let err = ApiError::not_found("Video not found").context("Failed to fetch video");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_mux_not_found_maps_to_404() {
        let err = ApiError::from(MuxError::NotFound("asset a1".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
