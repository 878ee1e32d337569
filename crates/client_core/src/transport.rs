use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{ConversationId, MessageId},
    error::BridgeError,
    protocol::{BackendRequest, ConversationSummary, MessageRecord, ModelDescriptor},
};
use url::Url;

use crate::backend::ChatBackend;

/// Bridge transport posting each named call as JSON to a single endpoint.
///
/// A non-success status surfaces the response body text unchanged as the
/// failure message; transport-level failures surface the transport error
/// text. No classification happens here.
pub struct HttpBackend {
    http: Client,
    endpoint: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let endpoint = format!("{}/rpc", base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|err| BridgeError::new(format!("invalid backend url '{base_url}': {err}")))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: &BackendRequest) -> Result<T, BridgeError> {
        let body = self.call_raw(request).await?;
        serde_json::from_str(&body)
            .map_err(|err| BridgeError::new(format!("invalid backend response: {err}")))
    }

    /// For operations with no result payload the body is not interpreted.
    async fn call_unit(&self, request: &BackendRequest) -> Result<(), BridgeError> {
        self.call_raw(request).await.map(|_| ())
    }

    async fn call_raw(&self, request: &BackendRequest) -> Result<String, BridgeError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| BridgeError::new(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| BridgeError::new(err.to_string()))?;

        if !status.is_success() {
            return Err(BridgeError::new(body));
        }

        Ok(body)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn check_connection(&self) -> Result<bool, BridgeError> {
        self.call(&BackendRequest::CheckConnection).await
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BridgeError> {
        self.call(&BackendRequest::ListModels).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BridgeError> {
        self.call(&BackendRequest::ListConversations).await
    }

    async fn create_conversation(
        &self,
        title: &str,
        model: &str,
    ) -> Result<ConversationId, BridgeError> {
        self.call(&BackendRequest::CreateConversation {
            title: title.to_string(),
            model: model.to_string(),
        })
        .await
    }

    async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), BridgeError> {
        self.call_unit(&BackendRequest::DeleteConversation {
            conversation_id: conversation_id.clone(),
        })
        .await
    }

    async fn rename_conversation(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), BridgeError> {
        self.call_unit(&BackendRequest::RenameConversation {
            conversation_id: conversation_id.clone(),
            title: title.to_string(),
        })
        .await
    }

    async fn get_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, BridgeError> {
        self.call(&BackendRequest::GetMessages {
            conversation_id: conversation_id.clone(),
        })
        .await
    }

    async fn send_chat_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        model: &str,
    ) -> Result<String, BridgeError> {
        self.call(&BackendRequest::SendChatMessage {
            conversation_id: conversation_id.clone(),
            content: content.to_string(),
            model: model.to_string(),
        })
        .await
    }

    async fn update_message(
        &self,
        message_id: &MessageId,
        content: &str,
    ) -> Result<(), BridgeError> {
        self.call_unit(&BackendRequest::UpdateMessage {
            message_id: message_id.clone(),
            content: content.to_string(),
        })
        .await
    }

    async fn truncate_conversation(
        &self,
        conversation_id: &ConversationId,
        after_message_id: &MessageId,
    ) -> Result<(), BridgeError> {
        self.call_unit(&BackendRequest::TruncateConversation {
            conversation_id: conversation_id.clone(),
            after_message_id: after_message_id.clone(),
        })
        .await
    }

    async fn regenerate_response(
        &self,
        conversation_id: &ConversationId,
        model: &str,
    ) -> Result<String, BridgeError> {
        self.call(&BackendRequest::RegenerateResponse {
            conversation_id: conversation_id.clone(),
            model: model.to_string(),
        })
        .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
