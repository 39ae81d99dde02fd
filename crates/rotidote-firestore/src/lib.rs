//! Firestore REST API client.
//!
//! This crate provides:
//! - Typed repositories for the `videos` and `users` collections
//! - Service account authentication via gcp_auth (or the local emulator)
//! - Token caching, merge updates with preconditions, and retry logic

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod users;
pub mod videos;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use token_cache::TokenSource;
pub use error::{FirestoreError, FirestoreResult};
pub use types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
pub use users::UserRepository;
pub use videos::{clamp_public_limit, VideoRepository};
