//! Video feed, detail, reaction and refresh handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rotidote_models::{Reaction, VideoId, VideoRecord, VideoStatus};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

const VIDEO_NOT_FOUND: &str = "Video not found";

#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoRecord>,
}

/// A video plus ready-to-play HLS URLs.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub ad_video_playback_url: Option<String>,
    pub main_video_playback_url: Option<String>,
}

impl From<VideoRecord> for VideoResponse {
    fn from(video: VideoRecord) -> Self {
        Self {
            ad_video_playback_url: video.ad_playback_url(),
            main_video_playback_url: video.main_playback_url(),
            video,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicFeedQuery {
    /// Kept as text so a malformed value falls back to the default
    pub limit: Option<String>,
}

fn parse_video_id(raw: &str) -> ApiResult<VideoId> {
    if VideoId::is_valid(raw) {
        Ok(VideoId::from_string(raw))
    } else {
        Err(ApiError::not_found(VIDEO_NOT_FOUND))
    }
}

fn video_not_found(e: ApiError, summary: &str) -> ApiError {
    match e {
        ApiError::NotFound(_) => ApiError::not_found(VIDEO_NOT_FOUND),
        other => other.context(summary),
    }
}

async fn load_video(state: &AppState, video_id: &VideoId) -> ApiResult<VideoRecord> {
    state
        .videos
        .get(video_id)
        .await
        .map_err(|e| e.context("Failed to fetch video"))?
        .ok_or_else(|| ApiError::not_found(VIDEO_NOT_FOUND))
}

/// The caller's own videos, newest first.
pub async fn list_my_videos(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<VideoListResponse>> {
    let videos = state
        .videos
        .list_by_creator(&user.uid)
        .await
        .map_err(|e| e.context("Failed to fetch videos"))?;

    debug!(uid = %user.uid, count = videos.len(), "Listed creator videos");
    Ok(Json(VideoListResponse { videos }))
}

/// Home feed of ready videos.
pub async fn list_public_videos(
    State(state): State<AppState>,
    Query(query): Query<PublicFeedQuery>,
) -> ApiResult<Json<VideoListResponse>> {
    let limit = query.limit.as_deref().and_then(|l| l.trim().parse::<u32>().ok());

    let videos = state
        .videos
        .list_public(limit)
        .await
        .map_err(|e| e.context("Failed to fetch videos"))?;

    Ok(Json(VideoListResponse { videos }))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let video_id = parse_video_id(&video_id)?;
    let video = load_video(&state, &video_id).await?;
    Ok(Json(video.into()))
}

async fn react(state: &AppState, user: &AuthUser, raw_id: &str, reaction: Reaction) -> ApiResult<Json<VideoResponse>> {
    let video_id = parse_video_id(raw_id)?;

    let video = state
        .videos
        .increment_reaction(&video_id, reaction)
        .await
        .map_err(|e| video_not_found(e, "Failed to record reaction"))?;

    metrics::record_reaction(reaction.counter_field());
    info!(
        video_id = %video_id,
        uid = %user.uid,
        counter = reaction.counter_field(),
        value = video.reaction_count(reaction),
        "Reaction recorded"
    );
    Ok(Json(video.into()))
}

pub async fn like_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    react(&state, &user, &video_id, Reaction::Like).await
}

pub async fn dislike_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    react(&state, &user, &video_id, Reaction::Dislike).await
}

/// Re-read both Mux assets and promote the video to `ready` or `failed`.
///
/// Only the creator may refresh. A video whose assets are still preparing
/// is returned unchanged.
pub async fn refresh_video(
    State(state): State<AppState>,
    user: AuthUser,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let video_id = parse_video_id(&video_id)?;
    let video = load_video(&state, &video_id).await?;

    if video.creator_id != user.uid {
        return Err(ApiError::forbidden("Only the creator can refresh this video"));
    }
    if video.status != VideoStatus::Processing {
        return Ok(Json(video.into()));
    }

    let summary = "Failed to refresh video";
    let ad_asset = state
        .video_host
        .asset(&video.ad_video_mux_key)
        .await
        .map_err(|e| e.context(summary))?;
    let main_asset = state
        .video_host
        .asset(&video.main_video_mux_key)
        .await
        .map_err(|e| e.context(summary))?;

    if ad_asset.is_errored() || main_asset.is_errored() {
        let failed = state
            .videos
            .mark_failed(&video_id)
            .await
            .map_err(|e| video_not_found(e, summary))?;
        return Ok(Json(failed.into()));
    }

    let playback_ids = (ad_asset.playback_id.as_deref(), main_asset.playback_id.as_deref());
    match playback_ids {
        (Some(ad_pb), Some(main_pb)) if ad_asset.is_ready() && main_asset.is_ready() => {
            let duration = main_asset.duration.unwrap_or(video.duration);
            let ready = state
                .videos
                .mark_ready(&video_id, ad_pb, main_pb, duration)
                .await
                .map_err(|e| video_not_found(e, summary))?;
            Ok(Json(ready.into()))
        }
        _ => {
            debug!(
                video_id = %video_id,
                ad_status = %ad_asset.status,
                main_status = %main_asset.status,
                "Assets still preparing"
            );
            Ok(Json(video.into()))
        }
    }
}
