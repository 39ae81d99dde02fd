//! Repository for the top-level `users` collection.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use rotidote_models::UserProfile;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, ToFirestoreValue, Value};

const COLLECTION: &str = "users";

/// Repository for user profile documents, keyed by Firebase UID.
#[derive(Clone)]
pub struct UserRepository {
    client: FirestoreClient,
}

impl UserRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<UserProfile>> {
        let doc = self.client.get_document(COLLECTION, uid).await?;
        Ok(doc.map(|d| document_to_profile(&d, uid)))
    }

    /// Write the whole profile. An existing document keeps its `createdAt`.
    pub async fn save(&self, profile: &UserProfile) -> FirestoreResult<UserProfile> {
        let mut profile = profile.clone();
        if let Some(existing) = self.get(&profile.id).await? {
            profile.created_at = existing.created_at;
        }

        self.client
            .set_document(COLLECTION, &profile.id, profile_to_fields(&profile))
            .await?;
        info!(uid = %profile.id, complete = profile.is_complete(), "Saved user profile");
        Ok(profile)
    }
}

fn profile_to_fields(profile: &UserProfile) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), profile.id.to_firestore_value());
    fields.insert("email".to_string(), profile.email.to_firestore_value());
    fields.insert("name".to_string(), profile.name.to_firestore_value());
    fields.insert("grade".to_string(), profile.grade.to_firestore_value());
    fields.insert("section".to_string(), profile.section.to_firestore_value());
    fields.insert("schoolName".to_string(), profile.school_name.to_firestore_value());
    fields.insert("createdAt".to_string(), profile.created_at.to_firestore_value());
    fields.insert("updatedAt".to_string(), profile.updated_at.to_firestore_value());
    fields
}

fn document_to_profile(doc: &Document, uid: &str) -> UserProfile {
    let created_at = doc.field("createdAt").unwrap_or_else(Utc::now);
    UserProfile {
        id: uid.to_string(),
        email: doc.field("email").unwrap_or_default(),
        name: doc.field("name").unwrap_or_default(),
        grade: doc.field("grade").unwrap_or_default(),
        section: doc.field("section").unwrap_or_default(),
        school_name: doc.field("schoolName").unwrap_or_default(),
        created_at,
        updated_at: doc.field("updatedAt").unwrap_or(created_at),
    }
}
