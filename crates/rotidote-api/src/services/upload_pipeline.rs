//! The five-step video upload pipeline.
//!
//! An upload pairs an ad video with a main video and a thumbnail. The steps
//! run strictly in order and the first failure aborts the whole upload:
//!
//! 1. `ad_video` - open a Mux direct upload and push the ad bytes
//! 2. `main_video` - the same for the main video
//! 3. `thumbnail` - upload the thumbnail to Cloudinary
//! 4. `asset_metadata` - resolve both asset ids and read the assets
//! 5. `persist` - write the composite video document

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use rotidote_cloudinary::ImageFile;
use rotidote_models::{AssetDetails, MediaKind, UploadStage, UploadTicket, VideoId, VideoRecord, VideoStatus};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::{ImageHost, VideoHost, VideoStore};
use crate::state::AppState;

pub const MISSING_FIELDS: &str =
    "Missing required fields: creatorName, videoTitle, and files are required";
pub const MISSING_FILES: &str = "All files are required: adVideo, mainVideo, and thumbnail";

/// One uploaded file, buffered in memory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub bytes: Bytes,
}

impl From<MediaFile> for ImageFile {
    fn from(file: MediaFile) -> Self {
        ImageFile {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
        }
    }
}

/// Raw multipart form of `POST /upload-video`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub creator_name: Option<String>,
    pub video_title: Option<String>,
    pub duration: Option<String>,
    pub ad_video: Option<MediaFile>,
    pub main_video: Option<MediaFile>,
    pub thumbnail: Option<MediaFile>,
}

/// A validated upload, ready to run.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub creator_id: String,
    pub creator_name: String,
    pub title: String,
    /// Duration reported by the client, used when Mux doesn't know it yet
    pub client_duration: Option<f64>,
    pub ad_video: MediaFile,
    pub main_video: MediaFile,
    pub thumbnail: MediaFile,
}

/// What a successful upload produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub ad_video_asset_id: String,
    pub main_video_asset_id: String,
    pub thumbnail_url: String,
    pub video_data: VideoRecord,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
}

/// Buffer a file field, rejecting it once it grows past `max_size`.
///
/// The MIME type is checked before any bytes are read.
pub async fn read_file_field(
    mut field: Field<'_>,
    expected: MediaKind,
    max_size: usize,
    size_label: &str,
) -> ApiResult<MediaFile> {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().unwrap_or(&name).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let kind = MediaKind::from_content_type(&content_type)?;
    if kind != expected {
        return Err(ApiError::bad_request(format!(
            "Invalid file type for {}: expected {} file",
            name,
            if expected == MediaKind::Video { "a video" } else { "an image" }
        )));
    }

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buf.len() + chunk.len() > max_size {
            return Err(ApiError::bad_request(format!(
                "File too large. Maximum size is {}.",
                size_label
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(MediaFile {
        file_name,
        content_type,
        kind,
        bytes: buf.freeze(),
    })
}

impl UploadForm {
    /// Read the multipart body. Unknown fields are skipped.
    pub async fn read(mut multipart: Multipart, max_file_size: usize, size_label: &str) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "creatorName" | "videoTitle" | "duration" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    let slot = match name.as_str() {
                        "creatorName" => &mut form.creator_name,
                        "videoTitle" => &mut form.video_title,
                        _ => &mut form.duration,
                    };
                    *slot = Some(text);
                }
                "adVideo" | "mainVideo" | "thumbnail" => {
                    let (slot, kind) = match name.as_str() {
                        "adVideo" => (&mut form.ad_video, MediaKind::Video),
                        "mainVideo" => (&mut form.main_video, MediaKind::Video),
                        _ => (&mut form.thumbnail, MediaKind::Image),
                    };
                    if slot.is_some() {
                        return Err(ApiError::bad_request(format!("Only one {} file is allowed", name)));
                    }
                    *slot = Some(read_file_field(field, kind, max_file_size, size_label).await?);
                }
                _ => debug!(field = %name, "Ignoring unexpected multipart field"),
            }
        }

        Ok(form)
    }

    /// Check required fields and files.
    pub fn validate(self, creator_id: &str) -> ApiResult<UploadRequest> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let has_any_file = self.ad_video.is_some() || self.main_video.is_some() || self.thumbnail.is_some();
        let (Some(creator_name), Some(title)) = (non_blank(self.creator_name), non_blank(self.video_title)) else {
            return Err(ApiError::bad_request(MISSING_FIELDS));
        };
        if !has_any_file {
            return Err(ApiError::bad_request(MISSING_FIELDS));
        }

        let (Some(ad_video), Some(main_video), Some(thumbnail)) = (self.ad_video, self.main_video, self.thumbnail)
        else {
            return Err(ApiError::bad_request(MISSING_FILES));
        };

        Ok(UploadRequest {
            creator_id: creator_id.to_string(),
            creator_name,
            title,
            client_duration: self.duration.as_deref().and_then(parse_duration),
            ad_video,
            main_video,
            thumbnail,
        })
    }
}

/// Strict parse: unit suffixes ("42s") and negative values are dropped rather
/// than salvaged, so a bad client value falls through to the Mux duration or 0.
fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)
}

/// Main asset duration when Mux has one, else the client's, else zero.
pub fn resolve_duration(main_asset: Option<f64>, client: Option<f64>) -> f64 {
    main_asset
        .filter(|d| *d > 0.0)
        .or(client)
        .unwrap_or(0.0)
}

/// Run one stage: time it, record it, and tag any failure with the stage.
async fn run_stage<T, F>(stage: UploadStage, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    let start = Instant::now();
    let result = fut.instrument(info_span!("upload_stage", stage = %stage)).await;
    let elapsed = start.elapsed();
    metrics::record_upload_stage(stage.as_str(), result.is_ok(), elapsed.as_secs_f64());

    match result {
        Ok(value) => {
            let duration_ms = elapsed.as_millis() as u64;
            debug!(stage = %stage, duration_ms, "Upload stage completed");
            Ok(value)
        }
        Err(e) => {
            warn!(stage = %stage, "Upload stage failed: {}", e);
            Err(ApiError::UploadFailed {
                stage,
                message: e.detail(),
            })
        }
    }
}

/// Orchestrates an upload across the video host, image host and video store.
#[derive(Clone)]
pub struct UploadPipeline {
    video_host: Arc<dyn VideoHost>,
    image_host: Arc<dyn ImageHost>,
    videos: Arc<dyn VideoStore>,
}

impl UploadPipeline {
    pub fn new(
        video_host: Arc<dyn VideoHost>,
        image_host: Arc<dyn ImageHost>,
        videos: Arc<dyn VideoStore>,
    ) -> Self {
        Self {
            video_host,
            image_host,
            videos,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::clone(&state.video_host),
            Arc::clone(&state.image_host),
            Arc::clone(&state.videos),
        )
    }

    async fn push_video(&self, file: MediaFile) -> ApiResult<UploadTicket> {
        let ticket = self.video_host.create_upload().await?;
        debug!(upload_id = %ticket.upload_id, size_bytes = file.bytes.len(), "Pushing video bytes");
        self.video_host
            .push_bytes(&ticket, &file.content_type, file.bytes)
            .await?;
        Ok(ticket)
    }

    async fn asset_for(&self, ticket: &UploadTicket) -> ApiResult<AssetDetails> {
        let asset_id = match &ticket.asset_id {
            Some(id) => id.clone(),
            None => self.video_host.resolve_asset_id(&ticket.upload_id).await?,
        };
        self.video_host.asset(&asset_id).await
    }

    /// Run all five stages in order.
    pub async fn run(&self, request: UploadRequest) -> ApiResult<UploadOutcome> {
        let result = self.run_stages(request).await;
        match &result {
            Ok(_) => metrics::record_upload_outcome("success"),
            Err(ApiError::UploadFailed { stage, .. }) => metrics::record_upload_outcome(stage.as_str()),
            Err(_) => metrics::record_upload_outcome("error"),
        }
        result
    }

    async fn run_stages(&self, request: UploadRequest) -> ApiResult<UploadOutcome> {
        let UploadRequest {
            creator_id,
            creator_name,
            title,
            client_duration,
            ad_video,
            main_video,
            thumbnail,
        } = request;

        let ad_ticket = run_stage(UploadStage::AdVideo, self.push_video(ad_video)).await?;
        let main_ticket = run_stage(UploadStage::MainVideo, self.push_video(main_video)).await?;

        let thumbnail_url = run_stage(
            UploadStage::Thumbnail,
            self.image_host.upload_thumbnail(thumbnail.into()),
        )
        .await?;

        let (ad_asset, main_asset) = run_stage(UploadStage::AssetMetadata, async {
            let ad_asset = self.asset_for(&ad_ticket).await?;
            let main_asset = self.asset_for(&main_ticket).await?;
            Ok::<_, ApiError>((ad_asset, main_asset))
        })
        .await?;

        let now = Utc::now();
        let video = VideoRecord {
            id: VideoId::new(),
            title,
            creator_name,
            creator_id,
            duration: resolve_duration(main_asset.duration, client_duration),
            ad_video_mux_key: ad_asset.asset_id.clone(),
            main_video_mux_key: main_asset.asset_id.clone(),
            ad_video_playback_id: ad_asset.playback_id.clone(),
            main_video_playback_id: main_asset.playback_id.clone(),
            thumbnail_url: thumbnail_url.clone(),
            status: VideoStatus::Processing,
            likes: 0,
            dislikes: 0,
            comments: 0,
            created_at: now,
            updated_at: now,
        };

        run_stage(UploadStage::Persist, self.videos.create(&video)).await?;

        info!(
            video_id = %video.id,
            creator_id = %video.creator_id,
            ad_asset_id = %ad_asset.asset_id,
            main_asset_id = %main_asset.asset_id,
            "Video upload completed"
        );

        Ok(UploadOutcome {
            ad_video_asset_id: ad_asset.asset_id,
            main_video_asset_id: main_asset.asset_id,
            thumbnail_url,
            video_data: video,
        })
    }
}
