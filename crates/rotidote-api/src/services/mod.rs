//! Upstream seams and the upload pipeline.

pub mod hosting;
pub mod stores;
pub mod upload_pipeline;

pub use hosting::{ImageHost, VideoHost};
pub use stores::{UserStore, VideoStore};
pub use upload_pipeline::{UploadForm, UploadOutcome, UploadPipeline, UploadRequest};
