//! Mux asset and direct-upload views returned to clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Base URL for Mux HLS playback.
const MUX_STREAM_BASE: &str = "https://stream.mux.com";

/// HLS playback URL for a Mux playback ID.
pub fn playback_url(playback_id: &str) -> String {
    format!("{}/{}.m3u8", MUX_STREAM_BASE, playback_id)
}

/// A direct-upload slot handed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    /// Signed URL accepting a single PUT of the file bytes
    pub upload_url: String,
    pub upload_id: String,
    /// Mux only assigns the asset once the bytes have arrived
    pub asset_id: Option<String>,
}

/// Asset summary exposed by `GET /asset/:assetId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetails {
    pub asset_id: String,
    pub playback_id: Option<String>,
    pub status: String,
    pub duration: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub created_at: Option<String>,
}

impl AssetDetails {
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }

    pub fn is_errored(&self) -> bool {
        self.status == "errored"
    }

    pub fn playback_url(&self) -> Option<String> {
        self.playback_id.as_deref().map(playback_url)
    }
}
