//! Mux asset lookup.

use axum::extract::{Path, State};
use axum::Json;

use rotidote_models::{AssetDetails, VideoId};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Asset status, playback id and duration.
pub async fn get_asset(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(asset_id): Path<String>,
) -> ApiResult<Json<AssetDetails>> {
    // Asset ids share the path-segment alphabet of video ids
    if !VideoId::is_valid(&asset_id) {
        return Err(ApiError::bad_request("Asset ID is required"));
    }

    let asset = state
        .video_host
        .asset(&asset_id)
        .await
        .map_err(|e| e.context("Failed to get asset details"))?;

    Ok(Json(asset))
}
