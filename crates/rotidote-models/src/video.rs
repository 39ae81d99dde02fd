//! Video document models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::asset::playback_url;

/// Unique identifier for a published video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Document IDs are path segments; reject anything that could escape one.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.len() <= 128
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Mux is still transcoding one or both videos
    #[default]
    Processing,
    /// Both videos are playable
    Ready,
    /// Mux reported an errored asset
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "ready" => Ok(VideoStatus::Ready),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status: {}", other)),
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Viewer reaction to a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    /// Document field holding the counter for this reaction.
    pub fn counter_field(&self) -> &'static str {
        match self {
            Reaction::Like => "likes",
            Reaction::Dislike => "dislikes",
        }
    }
}

/// Composite video document stored in the `videos` collection.
///
/// An upload pairs a pre-roll ad with the main video; both live at Mux and
/// are referenced by asset ID (the "mux key") and playback ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    pub creator_name: String,
    pub creator_id: String,
    /// Main video duration in seconds
    #[serde(default)]
    pub duration: f64,
    pub ad_video_mux_key: String,
    pub main_video_mux_key: String,
    #[serde(default)]
    pub ad_video_playback_id: Option<String>,
    #[serde(default)]
    pub main_video_playback_id: Option<String>,
    pub thumbnail_url: String,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
    #[serde(default)]
    pub comments: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Playback URL of the ad video, when Mux has assigned a playback ID.
    pub fn ad_playback_url(&self) -> Option<String> {
        self.ad_video_playback_id.as_deref().map(playback_url)
    }

    /// Playback URL of the main video, when Mux has assigned a playback ID.
    pub fn main_playback_url(&self) -> Option<String> {
        self.main_video_playback_id.as_deref().map(playback_url)
    }

    /// Whether the player can start the ad-then-main sequence.
    pub fn is_playable(&self) -> bool {
        self.status == VideoStatus::Ready
            && self.ad_video_playback_id.is_some()
            && self.main_video_playback_id.is_some()
    }

    pub fn reaction_count(&self, reaction: Reaction) -> u32 {
        match reaction {
            Reaction::Like => self.likes,
            Reaction::Dislike => self.dislikes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VideoRecord {
        let now = Utc::now();
        VideoRecord {
            id: VideoId::from_string("vid-1"),
            title: "Fractions in five minutes".to_string(),
            creator_name: "Asha".to_string(),
            creator_id: "uid-1".to_string(),
            duration: 312.5,
            ad_video_mux_key: "asset-ad".to_string(),
            main_video_mux_key: "asset-main".to_string(),
            ad_video_playback_id: Some("pb-ad".to_string()),
            main_video_playback_id: None,
            thumbnail_url: "https://res.cloudinary.com/demo/thumb.jpg".to_string(),
            status: VideoStatus::Processing,
            likes: 3,
            dislikes: 1,
            comments: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_video_id_validation() {
        assert!(VideoId::is_valid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(VideoId::is_valid("abc_DEF-123"));
        assert!(!VideoId::is_valid(""));
        assert!(!VideoId::is_valid("../users"));
        assert!(!VideoId::is_valid("a/b"));
        assert!(!VideoId::is_valid(&"x".repeat(129)));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [VideoStatus::Processing, VideoStatus::Ready, VideoStatus::Failed] {
            assert_eq!(status.as_str().parse::<VideoStatus>().unwrap(), status);
        }
        tokio_test::assert_err!("published".parse::<VideoStatus>());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["creatorName"], "Asha");
        assert_eq!(json["adVideoMuxKey"], "asset-ad");
        assert_eq!(json["status"], "processing");
        assert!(json.get("creator_name").is_none());
    }

    #[test]
    fn test_playback_urls() {
        let record = sample();
        assert_eq!(
            record.ad_playback_url().as_deref(),
            Some("https://stream.mux.com/pb-ad.m3u8")
        );
        assert_eq!(record.main_playback_url(), None);
    }

    #[test]
    fn test_playable_requires_ready_and_both_ids() {
        let mut record = sample();
        assert!(!record.is_playable());

        record.main_video_playback_id = Some("pb-main".to_string());
        assert!(!record.is_playable());

        record.status = VideoStatus::Ready;
        assert!(record.is_playable());
    }

    #[test]
    fn test_reaction_counters() {
        let record = sample();
        assert_eq!(record.reaction_count(Reaction::Like), 3);
        assert_eq!(record.reaction_count(Reaction::Dislike), 1);
        assert_eq!(Reaction::Like.counter_field(), "likes");
        assert_eq!(Reaction::Dislike.counter_field(), "dislikes");
    }
}
