//! Mux client error types.

use thiserror::Error;

pub type MuxResult<T> = Result<T, MuxError>;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("Mux is not configured: {0}")]
    Config(String),

    #[error("Mux request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Asset not ready: {0}")]
    AssetNotReady(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MuxError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MuxError::Network(_) => true,
            MuxError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let server = MuxError::RequestFailed {
            status: 503,
            body: "unavailable".into(),
        };
        let client = MuxError::RequestFailed {
            status: 400,
            body: "bad".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!MuxError::AssetNotReady("x".into()).is_retryable());
    }
}
