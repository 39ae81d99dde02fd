//! Repository for the top-level `videos` collection.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use rotidote_models::{Reaction, VideoId, VideoRecord, VideoStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::retry::exhausted;
use crate::types::{Document, StructuredQuery, ToFirestoreValue, Value};

const COLLECTION: &str = "videos";

/// Default page size for the public feed.
pub const DEFAULT_PUBLIC_LIMIT: u32 = 20;
/// Upper bound for the public feed page size.
pub const MAX_PUBLIC_LIMIT: u32 = 50;

/// Maximum attempts for optimistic counter updates.
const MAX_REACTION_ATTEMPTS: u32 = 5;

/// Repository for video documents.
#[derive(Clone)]
pub struct VideoRepository {
    client: FirestoreClient,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Create a new video record. Fails if the ID is already taken.
    pub async fn create(&self, video: &VideoRecord) -> FirestoreResult<()> {
        self.client
            .create_document(COLLECTION, video.id.as_str(), video_to_fields(video))
            .await?;
        info!(video_id = %video.id, creator_id = %video.creator_id, "Created video record");
        Ok(())
    }

    /// Get a video by ID.
    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        match self.client.get_document(COLLECTION, video_id.as_str()).await? {
            Some(doc) => Ok(Some(document_to_video(&doc, video_id)?)),
            None => Ok(None),
        }
    }

    /// All videos uploaded by one user, newest first.
    pub async fn list_by_creator(&self, creator_id: &str) -> FirestoreResult<Vec<VideoRecord>> {
        let query = StructuredQuery::collection(COLLECTION)
            .where_eq("creatorId", creator_id.to_firestore_value())
            .order_desc("createdAt");

        collect_videos(self.client.run_query(None, query).await?)
    }

    /// Ready videos for the public feed, newest first.
    ///
    /// `limit` defaults to 20 and is clamped to `1..=50`.
    pub async fn list_public(&self, limit: Option<u32>) -> FirestoreResult<Vec<VideoRecord>> {
        let query = StructuredQuery::collection(COLLECTION)
            .where_eq("status", VideoStatus::Ready.as_str().to_firestore_value())
            .order_desc("createdAt")
            .limit(clamp_public_limit(limit) as i32);

        collect_videos(self.client.run_query(None, query).await?)
    }

    /// Increment the like or dislike counter and return the updated record.
    ///
    /// Each attempt reads the document and writes back with its `updateTime` as
    /// a precondition, so concurrent reactions are never lost.
    pub async fn increment_reaction(
        &self,
        video_id: &VideoId,
        reaction: Reaction,
    ) -> FirestoreResult<VideoRecord> {
        let counter = reaction.counter_field();

        for attempt in 0..MAX_REACTION_ATTEMPTS {
            let doc = self
                .client
                .get_document(COLLECTION, video_id.as_str())
                .await?
                .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", COLLECTION, video_id)))?;

            let mut video = document_to_video(&doc, video_id)?;
            let update_time = doc.update_time.clone().ok_or_else(|| {
                FirestoreError::InvalidResponse(format!("video {} has no updateTime", video_id))
            })?;

            match reaction {
                Reaction::Like => video.likes = video.likes.saturating_add(1),
                Reaction::Dislike => video.dislikes = video.dislikes.saturating_add(1),
            }
            video.updated_at = Utc::now();

            let mut fields = HashMap::new();
            fields.insert(
                counter.to_string(),
                video.reaction_count(reaction).to_firestore_value(),
            );
            fields.insert("updatedAt".to_string(), video.updated_at.to_firestore_value());

            match self
                .client
                .update_document_with_precondition(
                    COLLECTION,
                    video_id.as_str(),
                    fields,
                    &[counter, "updatedAt"],
                    &update_time,
                )
                .await
            {
                Ok(_) => {
                    debug!(video_id = %video_id, counter, value = video.reaction_count(reaction), "Reaction recorded");
                    return Ok(video);
                }
                Err(e) if e.is_precondition_failed() => {
                    warn!(
                        video_id = %video_id,
                        attempt = attempt + 1,
                        "Reaction update raced with another writer, retrying"
                    );
                    record_precondition_conflict(COLLECTION);
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(exhausted("increment_reaction", MAX_REACTION_ATTEMPTS))
    }

    /// Store playback IDs and duration once both Mux assets are ready.
    pub async fn mark_ready(
        &self,
        video_id: &VideoId,
        ad_playback_id: &str,
        main_playback_id: &str,
        duration: f64,
    ) -> FirestoreResult<VideoRecord> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), VideoStatus::Ready.as_str().to_firestore_value());
        fields.insert("adVideoPlaybackId".to_string(), ad_playback_id.to_firestore_value());
        fields.insert("mainVideoPlaybackId".to_string(), main_playback_id.to_firestore_value());
        fields.insert("duration".to_string(), duration.to_firestore_value());
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());

        let doc = self
            .client
            .update_document(
                COLLECTION,
                video_id.as_str(),
                fields,
                &[
                    "status",
                    "adVideoPlaybackId",
                    "mainVideoPlaybackId",
                    "duration",
                    "updatedAt",
                ],
            )
            .await?;
        info!(video_id = %video_id, "Video marked ready");
        document_to_video(&doc, video_id)
    }

    /// Mark a video as failed.
    pub async fn mark_failed(&self, video_id: &VideoId) -> FirestoreResult<VideoRecord> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), VideoStatus::Failed.as_str().to_firestore_value());
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());

        let doc = self
            .client
            .update_document(COLLECTION, video_id.as_str(), fields, &["status", "updatedAt"])
            .await?;
        warn!(video_id = %video_id, "Video marked failed");
        document_to_video(&doc, video_id)
    }
}

/// Convert query results, skipping documents that fail to parse.
fn collect_videos(docs: Vec<Document>) -> FirestoreResult<Vec<VideoRecord>> {
    let mut videos = Vec::with_capacity(docs.len());
    for doc in docs {
        let Some(id) = doc.id() else { continue };
        let video_id = VideoId::from_string(id);
        match document_to_video(&doc, &video_id) {
            Ok(video) => videos.push(video),
            Err(e) => warn!(video_id = %video_id, "Skipping unreadable video document: {}", e),
        }
    }
    Ok(videos)
}

/// Clamp a requested public feed size to `1..=MAX_PUBLIC_LIMIT`.
pub fn clamp_public_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PUBLIC_LIMIT).clamp(1, MAX_PUBLIC_LIMIT)
}

fn video_to_fields(video: &VideoRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), video.id.as_str().to_firestore_value());
    fields.insert("title".to_string(), video.title.to_firestore_value());
    fields.insert("creatorName".to_string(), video.creator_name.to_firestore_value());
    fields.insert("creatorId".to_string(), video.creator_id.to_firestore_value());
    fields.insert("duration".to_string(), video.duration.to_firestore_value());
    fields.insert("adVideoMuxKey".to_string(), video.ad_video_mux_key.to_firestore_value());
    fields.insert("mainVideoMuxKey".to_string(), video.main_video_mux_key.to_firestore_value());
    fields.insert(
        "adVideoPlaybackId".to_string(),
        video.ad_video_playback_id.to_firestore_value(),
    );
    fields.insert(
        "mainVideoPlaybackId".to_string(),
        video.main_video_playback_id.to_firestore_value(),
    );
    fields.insert("thumbnailUrl".to_string(), video.thumbnail_url.to_firestore_value());
    fields.insert("status".to_string(), video.status.as_str().to_firestore_value());
    fields.insert("likes".to_string(), video.likes.to_firestore_value());
    fields.insert("dislikes".to_string(), video.dislikes.to_firestore_value());
    fields.insert("comments".to_string(), video.comments.to_firestore_value());
    fields.insert("createdAt".to_string(), video.created_at.to_firestore_value());
    fields.insert("updatedAt".to_string(), video.updated_at.to_firestore_value());
    fields
}

fn document_to_video(doc: &Document, video_id: &VideoId) -> FirestoreResult<VideoRecord> {
    let required = |key: &str| -> FirestoreResult<String> {
        doc.field::<String>(key).ok_or_else(|| {
            FirestoreError::InvalidResponse(format!("video {} is missing {}", video_id, key))
        })
    };

    let status = doc
        .field::<String>("status")
        .and_then(|s| s.parse::<VideoStatus>().ok())
        .unwrap_or_default();
    let created_at = doc.field("createdAt").unwrap_or_else(Utc::now);

    Ok(VideoRecord {
        id: video_id.clone(),
        title: required("title")?,
        creator_name: doc.field("creatorName").unwrap_or_default(),
        creator_id: required("creatorId")?,
        duration: doc.field("duration").unwrap_or(0.0),
        ad_video_mux_key: doc.field("adVideoMuxKey").unwrap_or_default(),
        main_video_mux_key: doc.field("mainVideoMuxKey").unwrap_or_default(),
        ad_video_playback_id: doc.field("adVideoPlaybackId"),
        main_video_playback_id: doc.field("mainVideoPlaybackId"),
        thumbnail_url: doc.field("thumbnailUrl").unwrap_or_default(),
        status,
        likes: doc.field("likes").unwrap_or(0),
        dislikes: doc.field("dislikes").unwrap_or(0),
        comments: doc.field("comments").unwrap_or(0),
        created_at,
        updated_at: doc.field("updatedAt").unwrap_or(created_at),
    })
}
