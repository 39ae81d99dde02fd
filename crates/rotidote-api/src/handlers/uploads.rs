//! Upload handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use rotidote_models::{MediaKind, UploadTicket};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::upload_pipeline::read_file_field;
use crate::services::{UploadForm, UploadOutcome, UploadPipeline};
use crate::state::AppState;

pub const MISSING_UPLOAD_FIELDS: &str =
    "Missing required fields: filename and contentType are required";

/// Body of `POST /create-upload`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadRequest {
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Open a Mux direct upload the client can PUT a file to.
pub async fn create_upload(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateUploadRequest>, JsonRejection>,
) -> ApiResult<Json<UploadTicket>> {
    let request = match payload {
        Ok(Json(request)) => request,
        // No JSON body at all reads as an empty form
        Err(JsonRejection::MissingJsonContentType(_)) => CreateUploadRequest::default(),
        Err(rejection) => {
            return Err(ApiError::bad_request(format!(
                "Invalid JSON body: {}",
                rejection.body_text()
            )))
        }
    };

    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !present(&request.filename) || !present(&request.content_type) {
        return Err(ApiError::bad_request(MISSING_UPLOAD_FIELDS));
    }

    let ticket = state
        .video_host
        .create_upload()
        .await
        .map_err(|e| e.context("Failed to create upload URL"))?;

    info!(
        uid = %user.uid,
        upload_id = %ticket.upload_id,
        filename = request.filename.as_deref().unwrap_or_default(),
        "Created direct upload"
    );
    Ok(Json(ticket))
}

/// Response of `POST /upload-video`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadVideoResponse {
    pub success: bool,
    pub video_id: String,
    pub message: String,
    pub data: UploadOutcome,
}

/// Upload an ad video, a main video and a thumbnail in one request.
pub async fn upload_video(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<UploadVideoResponse>> {
    let size_label = state.config.max_file_size_label();
    let form = UploadForm::read(multipart, state.config.max_file_size, &size_label).await?;
    let request = form.validate(&user.uid)?;

    let outcome = UploadPipeline::from_state(&state).run(request).await?;

    Ok(Json(UploadVideoResponse {
        success: true,
        video_id: outcome.video_data.id.to_string(),
        message: "Video upload completed successfully".to_string(),
        data: outcome,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadThumbnailResponse {
    pub thumbnail_url: String,
}

/// Upload a standalone thumbnail from the `thumbnail` multipart field.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadThumbnailResponse>> {
    let size_label = state.config.max_file_size_label();
    let mut thumbnail = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() == Some("thumbnail") && thumbnail.is_none() {
            thumbnail = Some(
                read_file_field(field, MediaKind::Image, state.config.max_file_size, &size_label).await?,
            );
        }
    }

    let thumbnail = thumbnail.ok_or_else(|| ApiError::bad_request("Thumbnail file is required"))?;

    let thumbnail_url = state
        .image_host
        .upload_thumbnail(thumbnail.into())
        .await
        .map_err(|e| e.context("Failed to upload thumbnail"))?;

    info!(uid = %user.uid, "Uploaded thumbnail");
    Ok(Json(UploadThumbnailResponse { thumbnail_url }))
}
