//! Record types persisted by the store

use serde::{Deserialize, Serialize};

/// A conversation owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    /// Bumped whenever a message is added or the title changes
    pub updated_at: i64,
}

/// One chat message, in insertion order within its conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub created_at: i64,
    /// Monotonic position inside the conversation
    pub seq: i64,
}

/// An artifact attached to an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub message_id: String,
    pub artifact_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

/// Fields supplied when adding an artifact
#[derive(Debug, Clone, Default)]
pub struct NewArtifact {
    pub artifact_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub metadata: serde_json::Value,
}

/// A numbered snapshot of a design within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignIterationRecord {
    pub id: String,
    pub conversation_id: String,
    pub parent_iteration_id: Option<String>,
    pub prompt_used: String,
    pub image_data: Option<Vec<u8>>,
    pub parameters: serde_json::Value,
    pub version: i64,
    pub created_at: i64,
}

impl DesignIterationRecord {
    /// Whether an image was stored with this iteration
    pub fn has_image(&self) -> bool {
        self.image_data.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// Fields supplied when saving a design iteration
///
/// When `version` is `None` the store assigns `max(version) + 1` for the
/// conversation.
#[derive(Debug, Clone, Default)]
pub struct NewIteration {
    pub prompt_used: String,
    pub image_data: Option<Vec<u8>>,
    pub parameters: serde_json::Value,
    pub version: Option<i64>,
    pub parent_iteration_id: Option<String>,
}
