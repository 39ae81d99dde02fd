//! Firebase ID token authentication.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Google JWKS URL for Firebase Auth.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase token issuer prefix.
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// JWKS cache TTL.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum gap between refreshes triggered by an unknown key ID.
const KID_MISS_COOLDOWN: Duration = Duration::from_secs(60);

pub const MISSING_TOKEN: &str = "Access token required";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Decoded Firebase ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// User ID
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub iss: String,
    /// Firebase project ID
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: Option<i64>,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
        }
    }
}

/// Verifies bearer tokens and resolves the caller.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, ApiError>;
}

/// JWKS response from Google.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Cached Google signing keys plus the project the tokens must belong to.
pub struct JwksCache {
    http: Client,
    jwks_url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Option<Instant>>,
    miss_cooldown: Duration,
    project_id: String,
}

impl JwksCache {
    /// Create a cache over Google's securetoken keys and try an initial fetch.
    ///
    /// A failed fetch is logged; keys are fetched again on the first verification.
    pub async fn new(project_id: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_source(project_id, GOOGLE_JWKS_URL, KID_MISS_COOLDOWN).await
    }

    pub async fn with_source(
        project_id: impl Into<String>,
        jwks_url: impl Into<String>,
        miss_cooldown: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        let cache = Self {
            http,
            jwks_url: jwks_url.into(),
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
            miss_cooldown,
            project_id: project_id.into(),
        };

        if let Err(e) = cache.refresh_keys().await {
            warn!("Initial JWKS fetch failed: {}", e);
        }

        Ok(cache)
    }

    /// Refresh JWKS keys from Google.
    async fn refresh_keys(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        debug!("Refreshing JWKS keys");

        let response = self.http.get(&self.jwks_url).send().await?;
        let jwks: JwksResponse = response.error_for_status()?.json().await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)?;
            keys.insert(jwk.kid, key);
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Some(Instant::now());

        debug!("Refreshed {} JWKS keys", key_count);
        Ok(())
    }

    async fn refreshed_within(&self, window: Duration) -> bool {
        let last = *self.last_refresh.read().await;
        last.is_some_and(|t| t.elapsed() <= window)
    }

    async fn try_refresh(&self) {
        if let Err(e) = self.refresh_keys().await {
            warn!("Failed to refresh JWKS keys: {}", e);
        }
    }

    /// Get decoding key for a key ID.
    ///
    /// An unknown ID triggers one early refresh, since Google rotates keys
    /// within the cache TTL. Those refreshes are spaced by `miss_cooldown`.
    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        if !self.refreshed_within(JWKS_CACHE_TTL).await {
            self.try_refresh().await;
        }

        if let Some(key) = self.keys.read().await.get(kid).cloned() {
            return Some(key);
        }

        if self.refreshed_within(self.miss_cooldown).await {
            return None;
        }
        debug!(kid = %kid, "Unknown key ID, refreshing JWKS");
        self.try_refresh().await;
        self.keys.read().await.get(kid).cloned()
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);
        validation
    }

    /// Verify a Firebase ID token.
    pub async fn verify_token(&self, token: &str) -> Result<FirebaseClaims, ApiError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Invalid token header: {}", e);
            ApiError::forbidden(INVALID_TOKEN)
        })?;

        let kid = header.kid.ok_or_else(|| ApiError::forbidden(INVALID_TOKEN))?;

        let key = self.get_key(&kid).await.ok_or_else(|| {
            debug!(kid = %kid, "Unknown key ID");
            ApiError::forbidden(INVALID_TOKEN)
        })?;

        let token_data = decode::<FirebaseClaims>(token, &key, &self.validation()).map_err(|e| {
            debug!("Token validation failed: {}", e);
            ApiError::forbidden(INVALID_TOKEN)
        })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl TokenVerifier for JwksCache {
    async fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        self.verify_token(token).await.map(AuthUser::from)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))?;

        match state.auth.verify(token).await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!("Token verification failed: {}", e);
                Err(ApiError::forbidden(INVALID_TOKEN))
            }
        }
    }
}
