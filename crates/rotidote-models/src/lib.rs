//! Shared data models for the Rotidote backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video documents and their lifecycle status
//! - User profiles and profile updates
//! - Mux asset and direct-upload views
//! - Media kinds and upload pipeline stages

pub mod asset;
pub mod media;
pub mod user;
pub mod video;

pub use asset::{playback_url, AssetDetails, UploadTicket};
pub use media::{MediaKind, MediaKindError, UploadStage};
pub use user::{ProfileUpdate, UserProfile};
pub use video::{Reaction, VideoId, VideoRecord, VideoStatus};
