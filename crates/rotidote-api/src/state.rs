//! Application state.

use std::sync::Arc;

use rotidote_cloudinary::CloudinaryClient;
use rotidote_firestore::{FirestoreClient, UserRepository, VideoRepository};
use rotidote_mux::MuxClient;

use crate::auth::{JwksCache, TokenVerifier};
use crate::config::ApiConfig;
use crate::services::{ImageHost, UserStore, VideoHost, VideoStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub auth: Arc<dyn TokenVerifier>,
    pub video_host: Arc<dyn VideoHost>,
    pub image_host: Arc<dyn ImageHost>,
    pub videos: Arc<dyn VideoStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Create new application state backed by Mux, Cloudinary and Firestore.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mux = MuxClient::from_env()?;
        let cloudinary = CloudinaryClient::from_env()?;
        let firestore = FirestoreClient::from_env().await?;
        let jwks = JwksCache::new(firestore.project_id()).await?;

        Ok(Self {
            config,
            auth: Arc::new(jwks),
            video_host: Arc::new(mux),
            image_host: Arc::new(cloudinary),
            videos: Arc::new(VideoRepository::new(firestore.clone())),
            users: Arc::new(UserRepository::new(firestore)),
        })
    }
}
