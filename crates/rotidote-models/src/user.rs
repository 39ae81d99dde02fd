//! User profile models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Profile stored in the `users` collection, keyed by Firebase UID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub school_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Create an empty profile for a freshly signed-up user.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            name: String::new(),
            grade: String::new(),
            section: String::new(),
            school_name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A profile is complete once every school field is filled in.
    /// Clients route incomplete profiles to the profile-setup screen.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.grade, &self.section, &self.school_name]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Apply a validated update, trimming each field.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        self.name = update.name.trim().to_string();
        self.grade = update.grade.trim().to_string();
        self.section = update.section.trim().to_string();
        self.school_name = update.school_name.trim().to_string();
        self.updated_at = Utc::now();
    }
}

/// Body of `PUT /users/me`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(custom(function = "trimmed_field"))]
    pub name: String,
    #[validate(custom(function = "trimmed_field"))]
    pub grade: String,
    #[validate(custom(function = "trimmed_field"))]
    pub section: String,
    #[validate(custom(function = "trimmed_field"))]
    pub school_name: String,
}

/// Longest value a profile field may hold once trimmed.
pub const MAX_FIELD_CHARS: usize = 100;

/// 1..=100 characters after trimming; surrounding whitespace is not counted.
fn trimmed_field(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if !(1..=MAX_FIELD_CHARS).contains(&len) {
        return Err(ValidationError::new("length"));
    }
    Ok(())
}
