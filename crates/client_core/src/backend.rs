use async_trait::async_trait;
use shared::{
    domain::{ConversationId, MessageId},
    error::BridgeError,
    protocol::{ConversationSummary, MessageRecord, ModelDescriptor},
};

/// Typed surface of the remote bridge: one method per named backend call.
///
/// Every operation is asynchronous and resolves to a result or a failure
/// carrying the backend's own error text. This layer does not retry, does not
/// time out, and does not serialize calls; callers that need ordering must
/// provide it themselves.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn check_connection(&self) -> Result<bool, BridgeError>;
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BridgeError>;
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BridgeError>;
    async fn create_conversation(
        &self,
        title: &str,
        model: &str,
    ) -> Result<ConversationId, BridgeError>;
    async fn delete_conversation(&self, conversation_id: &ConversationId)
        -> Result<(), BridgeError>;
    async fn rename_conversation(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), BridgeError>;
    async fn get_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, BridgeError>;
    /// Combined persist-and-generate: stores the user message, runs the model
    /// over the stored history, stores and returns the assistant reply.
    async fn send_chat_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        model: &str,
    ) -> Result<String, BridgeError>;
    async fn update_message(
        &self,
        message_id: &MessageId,
        content: &str,
    ) -> Result<(), BridgeError>;
    /// Deletes every persisted message after `after_message_id` in the
    /// conversation. The cutoff message itself is kept.
    async fn truncate_conversation(
        &self,
        conversation_id: &ConversationId,
        after_message_id: &MessageId,
    ) -> Result<(), BridgeError>;
    async fn regenerate_response(
        &self,
        conversation_id: &ConversationId,
        model: &str,
    ) -> Result<String, BridgeError>;
}

/// Stand-in used before a real transport is wired up.
pub struct MissingBackend;

impl MissingBackend {
    fn unavailable<T>(&self, operation: &str) -> Result<T, BridgeError> {
        Err(BridgeError::new(format!(
            "chat backend unavailable for {operation}"
        )))
    }
}

#[async_trait]
impl ChatBackend for MissingBackend {
    async fn check_connection(&self) -> Result<bool, BridgeError> {
        self.unavailable("check_connection")
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BridgeError> {
        self.unavailable("list_models")
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BridgeError> {
        self.unavailable("list_conversations")
    }

    async fn create_conversation(
        &self,
        _title: &str,
        _model: &str,
    ) -> Result<ConversationId, BridgeError> {
        self.unavailable("create_conversation")
    }

    async fn delete_conversation(
        &self,
        _conversation_id: &ConversationId,
    ) -> Result<(), BridgeError> {
        self.unavailable("delete_conversation")
    }

    async fn rename_conversation(
        &self,
        _conversation_id: &ConversationId,
        _title: &str,
    ) -> Result<(), BridgeError> {
        self.unavailable("rename_conversation")
    }

    async fn get_messages(
        &self,
        _conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, BridgeError> {
        self.unavailable("get_messages")
    }

    async fn send_chat_message(
        &self,
        _conversation_id: &ConversationId,
        _content: &str,
        _model: &str,
    ) -> Result<String, BridgeError> {
        self.unavailable("send_chat_message")
    }

    async fn update_message(
        &self,
        _message_id: &MessageId,
        _content: &str,
    ) -> Result<(), BridgeError> {
        self.unavailable("update_message")
    }

    async fn truncate_conversation(
        &self,
        _conversation_id: &ConversationId,
        _after_message_id: &MessageId,
    ) -> Result<(), BridgeError> {
        self.unavailable("truncate_conversation")
    }

    async fn regenerate_response(
        &self,
        _conversation_id: &ConversationId,
        _model: &str,
    ) -> Result<String, BridgeError> {
        self.unavailable("regenerate_response")
    }
}
