use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ConversationId, MessageId, Role};

/// Model entry as reported by the backend's model runtime.
///
/// Uniqueness is by `name`; the optional metadata is display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Persisted message as returned by the backend, in the backend's id space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Named backend call, one variant per remote operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum BackendRequest {
    CheckConnection,
    ListModels,
    ListConversations,
    CreateConversation {
        title: String,
        model: String,
    },
    DeleteConversation {
        conversation_id: ConversationId,
    },
    RenameConversation {
        conversation_id: ConversationId,
        title: String,
    },
    GetMessages {
        conversation_id: ConversationId,
    },
    SendChatMessage {
        conversation_id: ConversationId,
        content: String,
        model: String,
    },
    UpdateMessage {
        message_id: MessageId,
        content: String,
    },
    TruncateConversation {
        conversation_id: ConversationId,
        after_message_id: MessageId,
    },
    RegenerateResponse {
        conversation_id: ConversationId,
        model: String,
    },
}
