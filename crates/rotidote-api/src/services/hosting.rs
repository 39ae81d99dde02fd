//! Video and image hosting seams.

use async_trait::async_trait;
use bytes::Bytes;

use rotidote_cloudinary::{CloudinaryClient, ImageFile};
use rotidote_models::{AssetDetails, UploadTicket};
use rotidote_mux::MuxClient;

use crate::error::ApiResult;

/// Where video bytes go to be transcoded and streamed.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Open a direct-upload slot.
    async fn create_upload(&self) -> ApiResult<UploadTicket>;

    /// Push the whole file to a slot's upload URL.
    async fn push_bytes(&self, ticket: &UploadTicket, content_type: &str, bytes: Bytes) -> ApiResult<()>;

    /// Wait until the host has turned an upload into an asset.
    async fn resolve_asset_id(&self, upload_id: &str) -> ApiResult<String>;

    async fn asset(&self, asset_id: &str) -> ApiResult<AssetDetails>;
}

/// Where thumbnails go.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload a thumbnail and return its HTTPS URL.
    async fn upload_thumbnail(&self, file: ImageFile) -> ApiResult<String>;
}

#[async_trait]
impl VideoHost for MuxClient {
    async fn create_upload(&self) -> ApiResult<UploadTicket> {
        let upload = self.create_direct_upload().await?;
        Ok(UploadTicket {
            upload_url: upload.url,
            upload_id: upload.id,
            asset_id: upload.asset_id,
        })
    }

    async fn push_bytes(&self, ticket: &UploadTicket, content_type: &str, bytes: Bytes) -> ApiResult<()> {
        self.upload_bytes(&ticket.upload_url, content_type, bytes).await?;
        Ok(())
    }

    async fn resolve_asset_id(&self, upload_id: &str) -> ApiResult<String> {
        Ok(self.wait_for_asset_id(upload_id).await?)
    }

    async fn asset(&self, asset_id: &str) -> ApiResult<AssetDetails> {
        Ok(self.get_asset(asset_id).await?.into())
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload_thumbnail(&self, file: ImageFile) -> ApiResult<String> {
        Ok(CloudinaryClient::upload_thumbnail(self, file).await?)
    }
}
