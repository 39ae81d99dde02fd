//! Profile handlers for the signed-in user.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use validator::Validate;

use rotidote_models::{ProfileUpdate, UserProfile};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: UserProfile,
    pub profile_complete: bool,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            profile_complete: profile.is_complete(),
            profile,
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state
        .users
        .get(&user.uid)
        .await
        .map_err(|e| e.context("Failed to fetch profile"))?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(profile.into()))
}

/// Create or update the caller's profile. The email always comes from the token.
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<ProfileResponse>> {
    let Json(update) = payload.map_err(|rejection| ApiError::Validation {
        message: "Invalid profile".to_string(),
        details: rejection.body_text(),
    })?;
    update.validate()?;

    let mut profile = state
        .users
        .get(&user.uid)
        .await
        .map_err(|e| e.context("Failed to save profile"))?
        .unwrap_or_else(|| UserProfile::new(&user.uid, ""));

    if let Some(email) = &user.email {
        profile.email = email.clone();
    }
    profile.apply(&update);

    let saved = state
        .users
        .save(&profile)
        .await
        .map_err(|e| e.context("Failed to save profile"))?;

    Ok(Json(saved.into()))
}
