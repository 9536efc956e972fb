// Data models for the to-do store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh, not-yet-completed task
    ///
    /// `text` must already have passed [`normalize_text`].
    pub fn new(text: String) -> Self {
        Self {
            id: new_task_id(),
            text,
            completed: false,
            created_at: Utc::now(),
        }
    }
}

/// Rejections for user-supplied text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task text cannot be empty")]
    EmptyText,
}

/// Trim user input, rejecting anything that is blank afterwards
pub fn normalize_text(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

/// Generate a new task id (UUIDv7, time-ordered)
pub fn new_task_id() -> String {
    Uuid::now_v7().to_string()
}

// Older data used the creation time in milliseconds as a numeric id.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(s) => s,
        RawId::Int(i) => i.to_string(),
    })
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
