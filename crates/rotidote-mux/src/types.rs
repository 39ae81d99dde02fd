//! Mux API request and response types.

use serde::{Deserialize, Serialize};

use rotidote_models::AssetDetails;

/// Upload statuses after which no asset will ever be created.
const TERMINAL_UPLOAD_STATUSES: [&str; 3] = ["errored", "cancelled", "timed_out"];

/// Every Mux response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateUploadRequest {
    pub new_asset_settings: NewAssetSettings,
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewAssetSettings {
    pub playback_policy: Vec<String>,
    pub mp4_support: String,
}

impl Default for CreateUploadRequest {
    fn default() -> Self {
        Self {
            new_asset_settings: NewAssetSettings {
                playback_policy: vec!["public".to_string()],
                mp4_support: "standard".to_string(),
            },
            cors_origin: "*".to_string(),
        }
    }
}

/// A Mux direct upload.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectUpload {
    pub id: String,
    /// Signed URL accepting a single PUT
    #[serde(default)]
    pub url: String,
    pub status: String,
    /// Set once Mux has received the bytes and created the asset
    pub asset_id: Option<String>,
    pub error: Option<UploadError>,
}

impl DirectUpload {
    /// Whether the upload can no longer produce an asset.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_UPLOAD_STATUSES.contains(&self.status.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadError {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackId {
    pub id: String,
    pub policy: Option<String>,
}

/// A Mux video asset.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: String,
    pub status: String,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    /// Unix seconds, as a string
    pub created_at: Option<String>,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
}

impl Asset {
    pub fn first_playback_id(&self) -> Option<&str> {
        self.playback_ids.first().map(|p| p.id.as_str())
    }
}

impl From<Asset> for AssetDetails {
    fn from(asset: Asset) -> Self {
        let playback_id = asset.first_playback_id().map(str::to_string);
        AssetDetails {
            asset_id: asset.id,
            playback_id,
            status: asset.status,
            duration: asset.duration,
            aspect_ratio: asset.aspect_ratio,
            created_at: asset.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_upload_body() {
        let json = serde_json::to_value(CreateUploadRequest::default()).unwrap();
        assert_eq!(json["new_asset_settings"]["playback_policy"][0], "public");
        assert_eq!(json["new_asset_settings"]["mp4_support"], "standard");
        assert_eq!(json["cors_origin"], "*");
    }

    #[test]
    fn test_terminal_upload_status() {
        let upload: DirectUpload =
            serde_json::from_str(r#"{"id":"u1","status":"timed_out"}"#).unwrap();
        assert!(upload.is_terminal());
        assert!(upload.asset_id.is_none());

        let waiting: DirectUpload =
            serde_json::from_str(r#"{"id":"u1","url":"https://storage/x","status":"waiting"}"#)
                .unwrap();
        assert!(!waiting.is_terminal());
    }

    #[test]
    fn test_asset_details_surface_first_playback_id() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "status": "ready",
            "duration": 42.5,
            "aspect_ratio": "16:9",
            "created_at": "1700000000",
            "playback_ids": [{"id": "pb1", "policy": "public"}, {"id": "pb2", "policy": "signed"}]
        }))
        .unwrap();

        let details = AssetDetails::from(asset);
        assert_eq!(details.playback_id.as_deref(), Some("pb1"));
        assert_eq!(details.duration, Some(42.5));
        assert!(details.is_ready());
    }
}
