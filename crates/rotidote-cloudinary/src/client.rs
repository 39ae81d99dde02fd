//! Cloudinary upload API client.

use std::time::Duration;

use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{CloudinaryError, CloudinaryResult};
use crate::signing::sign;
use crate::types::{ErrorBody, ImageFile, UploadOptions, UploadResult};

/// Configuration for the Cloudinary client.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// API root, `https://api.cloudinary.com/v1_1` unless overridden
    pub base_url: String,
    pub timeout: Duration,
}

impl CloudinaryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> CloudinaryResult<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CloudinaryError::Config(format!("{} not set", name)))
        };

        Ok(Self {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
            base_url: std::env::var("CLOUDINARY_BASE_URL")
                .unwrap_or_else(|_| "https://api.cloudinary.com/v1_1".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CLOUDINARY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

/// Client for the Cloudinary upload API.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> CloudinaryResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CloudinaryError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> CloudinaryResult<Self> {
        Self::new(CloudinaryConfig::from_env()?)
    }

    /// Upload an image with signed options.
    pub async fn upload_image(
        &self,
        file: ImageFile,
        options: &UploadOptions,
    ) -> CloudinaryResult<UploadResult> {
        self.upload_image_at(file, options, Utc::now().timestamp()).await
    }

    async fn upload_image_at(
        &self,
        file: ImageFile,
        options: &UploadOptions,
        timestamp: i64,
    ) -> CloudinaryResult<UploadResult> {
        let url = format!(
            "{}/{}/image/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        );

        let params = options.signed_params(timestamp);
        let signature = sign(&params, &self.config.api_secret);

        let size = file.bytes.len();
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;

        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        debug!(size_bytes = size, "Uploading image to Cloudinary");
        let response = self.http.post(&url).multipart(form).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(CloudinaryError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let result: UploadResult = serde_json::from_slice(&body)?;
        if result.secure_url.is_none() {
            return Err(CloudinaryError::MissingUrl);
        }
        info!(public_id = %result.public_id, "Uploaded image to Cloudinary");
        Ok(result)
    }

    /// Upload a video thumbnail; returns its HTTPS URL.
    pub async fn upload_thumbnail(&self, file: ImageFile) -> CloudinaryResult<String> {
        let options = UploadOptions::thumbnail(Utc::now().timestamp_millis());
        let result = self.upload_image(file, &options).await?;
        result.secure_url.ok_or(CloudinaryError::MissingUrl)
    }
}
