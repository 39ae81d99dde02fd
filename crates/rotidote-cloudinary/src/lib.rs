//! Cloudinary upload client.
//!
//! Uploads images through the signed upload API. Only the thumbnail path of
//! the upload flow uses it.

pub mod client;
pub mod error;
pub mod signing;
pub mod types;

pub use client::{CloudinaryClient, CloudinaryConfig};
pub use error::{CloudinaryError, CloudinaryResult};
pub use types::{ImageFile, UploadOptions, UploadResult};
