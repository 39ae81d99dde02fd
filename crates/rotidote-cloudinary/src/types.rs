//! Cloudinary upload types.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;

/// Folder holding video thumbnails.
pub const THUMBNAIL_FOLDER: &str = "rotidote/thumbnails";

/// 400x225 fill crop, the card size used by the feed.
pub const THUMBNAIL_TRANSFORMATION: &str = "c_fill,h_225,w_400";

/// An in-memory image to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Signed upload parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOptions {
    pub folder: Option<String>,
    pub public_id: Option<String>,
    pub transformation: Option<String>,
}

impl UploadOptions {
    /// Options for a video thumbnail created at `unix_millis`.
    pub fn thumbnail(unix_millis: i64) -> Self {
        Self {
            folder: Some(THUMBNAIL_FOLDER.to_string()),
            public_id: Some(format!("thumbnail_{}", unix_millis)),
            transformation: Some(THUMBNAIL_TRANSFORMATION.to_string()),
        }
    }

    /// Parameters that go into the signature, with the request timestamp.
    pub fn signed_params(&self, timestamp: i64) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("timestamp".to_string(), timestamp.to_string());
        let optional = [
            ("folder", &self.folder),
            ("public_id", &self.public_id),
            ("transformation", &self.transformation),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                params.insert(key.to_string(), v.clone());
            }
        }
        params
    }
}

/// Subset of the upload API response we use.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub public_id: String,
    pub secure_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_options() {
        let options = UploadOptions::thumbnail(1_700_000_000_000);
        assert_eq!(options.public_id.as_deref(), Some("thumbnail_1700000000000"));

        let params = options.signed_params(1_700_000_000);
        let keys: Vec<_> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["folder", "public_id", "timestamp", "transformation"]);
        assert_eq!(params["transformation"], "c_fill,h_225,w_400");
    }

    #[test]
    fn test_default_options_sign_only_timestamp() {
        let params = UploadOptions::default().signed_params(5);
        assert_eq!(params.len(), 1);
        assert_eq!(params["timestamp"], "5");
    }
}
