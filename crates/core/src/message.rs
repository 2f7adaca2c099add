//! Message domain types.
//!
//! These are the value objects the engine consumes: the calling agent
//! framework produces messages, the orchestrator decides which of them
//! (and at what fidelity) reach the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (identity, rules)
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::with_role(Role::Tool, content)
    }

    /// Rewind the timestamp by the given number of minutes.
    ///
    /// Handy when replaying history into the engine: progressive
    /// compression keys off message age.
    pub fn aged_minutes(mut self, minutes: i64) -> Self {
        self.created_at -= chrono::Duration::minutes(minutes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello!");
    }

    #[test]
    fn aged_message_is_older() {
        let msg = Message::user("old").aged_minutes(90);
        let age = Utc::now() - msg.created_at;
        assert!(age.num_minutes() >= 90);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool_result("{\"ok\":true}");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "{\"ok\":true}");
        assert_eq!(deserialized.role, Role::Tool);
        assert_eq!(deserialized.id, msg.id);
    }

    #[test]
    fn message_wire_shape_is_flat() {
        // The wire shape is exactly {id, role, content, created_at} —
        // callers map their own framework's message type onto it.
        let msg = Message::user("hi");
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["role"], "user");
    }
}
