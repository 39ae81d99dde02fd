//! Persistence seams for videos and user profiles.

use async_trait::async_trait;

use rotidote_firestore::{UserRepository, VideoRepository};
use rotidote_models::{Reaction, UserProfile, VideoId, VideoRecord};

use crate::error::ApiResult;

/// Document id probed by readiness checks; it never exists.
const PROBE_ID: &str = "_readiness_probe";

#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(&self, video: &VideoRecord) -> ApiResult<()>;

    async fn get(&self, video_id: &VideoId) -> ApiResult<Option<VideoRecord>>;

    /// The creator's videos, newest first.
    async fn list_by_creator(&self, creator_id: &str) -> ApiResult<Vec<VideoRecord>>;

    /// Ready videos, newest first.
    async fn list_public(&self, limit: Option<u32>) -> ApiResult<Vec<VideoRecord>>;

    /// Bump a reaction counter without losing concurrent updates.
    async fn increment_reaction(&self, video_id: &VideoId, reaction: Reaction) -> ApiResult<VideoRecord>;

    async fn mark_ready(
        &self,
        video_id: &VideoId,
        ad_playback_id: &str,
        main_playback_id: &str,
        duration: f64,
    ) -> ApiResult<VideoRecord>;

    async fn mark_failed(&self, video_id: &VideoId) -> ApiResult<VideoRecord>;

    /// Round-trip to the backing store.
    async fn check(&self) -> ApiResult<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, uid: &str) -> ApiResult<Option<UserProfile>>;

    /// Write a profile; returns it as stored.
    async fn save(&self, profile: &UserProfile) -> ApiResult<UserProfile>;
}

#[async_trait]
impl VideoStore for VideoRepository {
    async fn create(&self, video: &VideoRecord) -> ApiResult<()> {
        Ok(VideoRepository::create(self, video).await?)
    }

    async fn get(&self, video_id: &VideoId) -> ApiResult<Option<VideoRecord>> {
        Ok(VideoRepository::get(self, video_id).await?)
    }

    async fn list_by_creator(&self, creator_id: &str) -> ApiResult<Vec<VideoRecord>> {
        Ok(VideoRepository::list_by_creator(self, creator_id).await?)
    }

    async fn list_public(&self, limit: Option<u32>) -> ApiResult<Vec<VideoRecord>> {
        Ok(VideoRepository::list_public(self, limit).await?)
    }

    async fn increment_reaction(&self, video_id: &VideoId, reaction: Reaction) -> ApiResult<VideoRecord> {
        Ok(VideoRepository::increment_reaction(self, video_id, reaction).await?)
    }

    async fn mark_ready(
        &self,
        video_id: &VideoId,
        ad_playback_id: &str,
        main_playback_id: &str,
        duration: f64,
    ) -> ApiResult<VideoRecord> {
        Ok(VideoRepository::mark_ready(self, video_id, ad_playback_id, main_playback_id, duration).await?)
    }

    async fn mark_failed(&self, video_id: &VideoId) -> ApiResult<VideoRecord> {
        Ok(VideoRepository::mark_failed(self, video_id).await?)
    }

    async fn check(&self) -> ApiResult<()> {
        VideoRepository::get(self, &VideoId::from_string(PROBE_ID)).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get(&self, uid: &str) -> ApiResult<Option<UserProfile>> {
        Ok(UserRepository::get(self, uid).await?)
    }

    async fn save(&self, profile: &UserProfile) -> ApiResult<UserProfile> {
        Ok(UserRepository::save(self, profile).await?)
    }
}
