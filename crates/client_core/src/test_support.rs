use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{ConversationId, MessageId, Role},
    error::BridgeError,
    protocol::{ConversationSummary, MessageRecord, ModelDescriptor},
};
use tokio::sync::{Mutex, Notify};

use crate::backend::ChatBackend;

#[derive(Default)]
struct TestBackendInner {
    connected: bool,
    models: Vec<ModelDescriptor>,
    conversations: Vec<ConversationSummary>,
    messages: HashMap<String, Vec<MessageRecord>>,
    reply: String,
    created_id: String,
    fail_ops: HashSet<&'static str>,
}

/// Scripted backend double: behavior is configured per test, every call is
/// recorded, and individual calls can be held open on a gate to force
/// interleavings.
pub(crate) struct TestBackend {
    inner: Mutex<TestBackendInner>,
    calls: Mutex<Vec<String>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl TestBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(TestBackendInner {
                reply: "test reply".to_string(),
                created_id: "conv-created".to_string(),
                ..TestBackendInner::default()
            }),
            calls: Mutex::new(Vec::new()),
            holds: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) async fn set_connected(&self, connected: bool) {
        self.inner.lock().await.connected = connected;
    }

    pub(crate) async fn set_models(&self, names: &[&str]) {
        self.inner.lock().await.models = names.iter().map(|name| model(name)).collect();
    }

    pub(crate) async fn set_conversations(&self, conversations: Vec<ConversationSummary>) {
        self.inner.lock().await.conversations = conversations;
    }

    pub(crate) async fn set_messages(&self, conversation: &str, records: Vec<MessageRecord>) {
        self.inner
            .lock()
            .await
            .messages
            .insert(conversation.to_string(), records);
    }

    pub(crate) async fn set_reply(&self, reply: &str) {
        self.inner.lock().await.reply = reply.to_string();
    }

    pub(crate) async fn set_created_id(&self, id: &str) {
        self.inner.lock().await.created_id = id.to_string();
    }

    pub(crate) async fn fail(&self, operation: &'static str) {
        self.inner.lock().await.fail_ops.insert(operation);
    }

    /// Holds every call matching `key` open until the returned gate is
    /// notified. Keys are the operation name, or `get_messages:<id>` for
    /// per-conversation holds.
    pub(crate) async fn hold(&self, key: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds
            .lock()
            .await
            .insert(key.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn called(&self, prefix: &str) -> bool {
        self.calls
            .lock()
            .await
            .iter()
            .any(|call| call.starts_with(prefix))
    }

    async fn enter(
        &self,
        operation: &'static str,
        call: String,
        hold_key: &str,
    ) -> Result<(), BridgeError> {
        self.calls.lock().await.push(call);

        let gate = { self.holds.lock().await.get(hold_key).cloned() };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.inner.lock().await.fail_ops.contains(operation) {
            return Err(BridgeError::new(format!("{operation} failed for test")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for TestBackend {
    async fn check_connection(&self) -> Result<bool, BridgeError> {
        self.enter(
            "check_connection",
            "check_connection".to_string(),
            "check_connection",
        )
        .await?;
        Ok(self.inner.lock().await.connected)
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BridgeError> {
        self.enter("list_models", "list_models".to_string(), "list_models")
            .await?;
        Ok(self.inner.lock().await.models.clone())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BridgeError> {
        self.enter(
            "list_conversations",
            "list_conversations".to_string(),
            "list_conversations",
        )
        .await?;
        Ok(self.inner.lock().await.conversations.clone())
    }

    async fn create_conversation(
        &self,
        title: &str,
        model: &str,
    ) -> Result<ConversationId, BridgeError> {
        self.enter(
            "create_conversation",
            format!("create_conversation({title}, {model})"),
            "create_conversation",
        )
        .await?;
        Ok(ConversationId::new(
            self.inner.lock().await.created_id.clone(),
        ))
    }

    async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), BridgeError> {
        self.enter(
            "delete_conversation",
            format!("delete_conversation({conversation_id})"),
            "delete_conversation",
        )
        .await
    }

    async fn rename_conversation(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), BridgeError> {
        self.enter(
            "rename_conversation",
            format!("rename_conversation({conversation_id}, {title})"),
            "rename_conversation",
        )
        .await
    }

    async fn get_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessageRecord>, BridgeError> {
        self.enter(
            "get_messages",
            format!("get_messages({conversation_id})"),
            &format!("get_messages:{conversation_id}"),
        )
        .await?;
        Ok(self
            .inner
            .lock()
            .await
            .messages
            .get(conversation_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn send_chat_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        model: &str,
    ) -> Result<String, BridgeError> {
        self.enter(
            "send_chat_message",
            format!("send_chat_message({conversation_id}, {content}, {model})"),
            "send_chat_message",
        )
        .await?;
        Ok(self.inner.lock().await.reply.clone())
    }

    async fn update_message(
        &self,
        message_id: &MessageId,
        content: &str,
    ) -> Result<(), BridgeError> {
        self.enter(
            "update_message",
            format!("update_message({message_id}, {content})"),
            "update_message",
        )
        .await
    }

    async fn truncate_conversation(
        &self,
        conversation_id: &ConversationId,
        after_message_id: &MessageId,
    ) -> Result<(), BridgeError> {
        self.enter(
            "truncate_conversation",
            format!("truncate_conversation({conversation_id}, {after_message_id})"),
            "truncate_conversation",
        )
        .await
    }

    async fn regenerate_response(
        &self,
        conversation_id: &ConversationId,
        model: &str,
    ) -> Result<String, BridgeError> {
        self.enter(
            "regenerate_response",
            format!("regenerate_response({conversation_id}, {model})"),
            "regenerate_response",
        )
        .await?;
        Ok(self.inner.lock().await.reply.clone())
    }
}

pub(crate) fn model(name: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        modified_at: None,
        size: None,
    }
}

pub(crate) fn conversation(id: &str, title: &str) -> ConversationSummary {
    ConversationSummary {
        id: ConversationId::new(id),
        title: title.to_string(),
        model: "llama3".to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).single().expect("timestamp"),
        updated_at: None,
    }
}

pub(crate) fn record(id: &str, role: Role, content: &str, offset_secs: i64) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(id),
        role,
        content: content.to_string(),
        created_at: Utc
            .timestamp_opt(1_700_000_000 + offset_secs, 0)
            .single()
            .expect("timestamp"),
    }
}
