//! Client for the Mux Video API.
//!
//! Covers the slice of Mux the upload flow needs: creating direct uploads,
//! pushing bytes to the signed upload URL, waiting for the asset to appear,
//! and reading asset status and playback IDs.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MuxClient, MuxConfig};
pub use error::{MuxError, MuxResult};
pub use types::{Asset, DirectUpload, PlaybackId};
