//! Media kinds accepted by the upload endpoints and the stages of the upload pipeline.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaKindError {
    #[error("Invalid file type. Only video and image files are allowed.")]
    Unsupported(String),
}

/// Broad class of an uploaded file, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a MIME type. Parameters (`; codecs=...`) are ignored.
    pub fn from_content_type(content_type: &str) -> Result<Self, MediaKindError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("video/") && essence.len() > "video/".len() {
            Ok(MediaKind::Video)
        } else if essence.starts_with("image/") && essence.len() > "image/".len() {
            Ok(MediaKind::Image)
        } else {
            Err(MediaKindError::Unsupported(content_type.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Steps of the upload pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    AdVideo,
    MainVideo,
    Thumbnail,
    AssetMetadata,
    Persist,
}

impl UploadStage {
    pub const ALL: [UploadStage; 5] = [
        UploadStage::AdVideo,
        UploadStage::MainVideo,
        UploadStage::Thumbnail,
        UploadStage::AssetMetadata,
        UploadStage::Persist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStage::AdVideo => "ad_video",
            UploadStage::MainVideo => "main_video",
            UploadStage::Thumbnail => "thumbnail",
            UploadStage::AssetMetadata => "asset_metadata",
            UploadStage::Persist => "persist",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_video_and_image() {
        assert_eq!(MediaKind::from_content_type("video/mp4").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_content_type("VIDEO/QuickTime").unwrap(), MediaKind::Video);
        assert_eq!(
            MediaKind::from_content_type("video/webm; codecs=vp9").unwrap(),
            MediaKind::Video
        );
        assert_eq!(MediaKind::from_content_type("image/jpeg").unwrap(), MediaKind::Image);
    }

    #[test]
    fn test_rejects_other_types() {
        for ct in ["application/pdf", "text/plain", "", "video/", "videos/mp4"] {
            let err = MediaKind::from_content_type(ct).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid file type. Only video and image files are allowed."
            );
        }
    }

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<&str> = UploadStage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["ad_video", "main_video", "thumbnail", "asset_metadata", "persist"]
        );
    }
}
