use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ConnectionState, ConversationId, LocalMessageId, MessageId, Role},
    error::BridgeError,
    protocol::MessageRecord,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::{backend::ChatBackend, connection::ConnectionMonitor, ClientEvent};

/// One timeline entry, keyed by a client-generated display key.
///
/// `remote_id` is the backend's id for the entry, known only for entries
/// that came from a full reload. The two id spaces are never merged: the
/// display key is for UI diffing, the backend key is for addressing the
/// backend, and optimistic entries simply have no backend key until the
/// next reload replaces them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMessage {
    pub local_key: LocalMessageId,
    pub remote_id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TimelineMessage {
    fn local(role: Role, content: impl Into<String>) -> Self {
        Self {
            local_key: LocalMessageId::fresh(),
            remote_id: None,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    fn from_record(record: MessageRecord) -> Self {
        Self {
            local_key: LocalMessageId::fresh(),
            remote_id: Some(record.id),
            role: record.role,
            content: record.content,
            timestamp: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSnapshot {
    pub conversation: Option<ConversationId>,
    pub messages: Vec<TimelineMessage>,
    pub loading: bool,
    pub last_error: Option<String>,
    /// Set while an optimistic local mutation is unconfirmed or after one
    /// failed; cleared by a successful full load or a fully confirmed
    /// operation.
    pub out_of_sync: bool,
}

#[derive(Debug, Error)]
pub enum TimelineError {
    /// A send or resubmit is already in flight for this timeline.
    #[error("another timeline operation is in flight")]
    Busy,
    #[error(transparent)]
    Backend(#[from] BridgeError),
}

#[derive(Default)]
struct TimelineState {
    conversation: Option<ConversationId>,
    messages: Vec<TimelineMessage>,
    loading: bool,
    last_error: Option<String>,
    out_of_sync: bool,
    busy: bool,
}

impl TimelineState {
    fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            conversation: self.conversation.clone(),
            messages: self.messages.clone(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            out_of_sync: self.out_of_sync,
        }
    }
}

/// Ordered message sequence for the one bound conversation.
///
/// Mutations are optimistic: the local sequence moves first, the backend
/// catches up, and a failed call leaves the local state ahead (flagged via
/// `out_of_sync`) until the next full load resyncs. The state lock is never
/// held across a backend call; results are applied only if the binding is
/// still the one the call was issued for.
pub struct MessageTimeline {
    backend: Arc<dyn ChatBackend>,
    monitor: Arc<ConnectionMonitor>,
    inner: Mutex<TimelineState>,
    events: broadcast::Sender<ClientEvent>,
}

impl MessageTimeline {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        monitor: Arc<ConnectionMonitor>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            backend,
            monitor,
            inner: Mutex::new(TimelineState::default()),
            events,
        }
    }

    pub async fn snapshot(&self) -> TimelineSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Binds the conversation and replaces the sequence with the backend's
    /// full history, in the backend's order. Every switch is a fresh fetch;
    /// nothing is cached across conversations. A result arriving after a
    /// newer `load` has re-bound the timeline is discarded (last writer wins
    /// by conversation id).
    pub async fn load(&self, conversation_id: ConversationId) -> Result<(), TimelineError> {
        {
            let mut guard = self.inner.lock().await;
            guard.conversation = Some(conversation_id.clone());
            guard.messages.clear();
            guard.loading = true;
            guard.last_error = None;
            guard.out_of_sync = false;
        }
        self.publish().await;

        let result = self.backend.get_messages(&conversation_id).await;

        let outcome = {
            let mut guard = self.inner.lock().await;
            if guard.conversation.as_ref() != Some(&conversation_id) {
                // superseded while in flight; not an error
                return Ok(());
            }
            guard.loading = false;
            match result {
                Ok(records) => {
                    guard.messages = records.into_iter().map(TimelineMessage::from_record).collect();
                    guard.out_of_sync = false;
                    Ok(())
                }
                Err(err) => {
                    guard.last_error = Some(err.to_string());
                    Err(TimelineError::from(err))
                }
            }
        };
        self.publish().await;
        outcome
    }

    /// Optimistically appends the user message, then runs the backend's
    /// combined persist-and-generate call and appends the reply.
    ///
    /// Precondition violations (no bound conversation, blank content, blank
    /// model, connection not live) are silent no-ops, even when the caller
    /// already checks them. Backend ids and timestamps for the new pair are
    /// not reconciled here; the next full load is the only resync point.
    pub async fn send(&self, content: &str, model: &str) -> Result<(), TimelineError> {
        let content = content.trim();
        let model = model.trim();
        if content.is_empty() || model.is_empty() {
            return Ok(());
        }
        if self.monitor.state().await != ConnectionState::Connected {
            return Ok(());
        }

        let conversation = {
            let mut guard = self.inner.lock().await;
            let Some(conversation) = guard.conversation.clone() else {
                return Ok(());
            };
            if guard.busy {
                return Err(TimelineError::Busy);
            }
            guard.busy = true;
            guard.loading = true;
            guard.last_error = None;
            guard.messages.push(TimelineMessage::local(Role::User, content));
            guard.out_of_sync = true;
            conversation
        };
        self.publish().await;

        let result = self
            .backend
            .send_chat_message(&conversation, content, model)
            .await;

        {
            let mut guard = self.inner.lock().await;
            guard.busy = false;
            guard.loading = false;
            if guard.conversation.as_ref() == Some(&conversation) {
                match &result {
                    Ok(reply) => {
                        guard
                            .messages
                            .push(TimelineMessage::local(Role::Assistant, reply.clone()));
                        guard.out_of_sync = false;
                    }
                    Err(err) => {
                        // the optimistic user message stays, visibly unanswered
                        guard.last_error = Some(err.to_string());
                    }
                }
            }
        }
        self.publish().await;
        result.map(|_| ()).map_err(TimelineError::from)
    }

    /// Point-edit: replaces the entry's content in place under the same
    /// display key, then persists through the backend. Entries without a
    /// backend id cannot be addressed remotely; the call is a no-op for
    /// them. A backend failure keeps the local edit.
    pub async fn update_message(
        &self,
        local_key: &LocalMessageId,
        new_content: &str,
    ) -> Result<(), TimelineError> {
        let (conversation, remote_id) = {
            let mut guard = self.inner.lock().await;
            let Some(conversation) = guard.conversation.clone() else {
                return Ok(());
            };
            let Some(entry) = guard
                .messages
                .iter_mut()
                .find(|message| &message.local_key == local_key)
            else {
                return Ok(());
            };
            let Some(remote_id) = entry.remote_id.clone() else {
                return Ok(());
            };
            entry.content = new_content.to_string();
            guard.out_of_sync = true;
            (conversation, remote_id)
        };
        self.publish().await;

        let result = self.backend.update_message(&remote_id, new_content).await;

        {
            let mut guard = self.inner.lock().await;
            if guard.conversation.as_ref() == Some(&conversation) {
                match &result {
                    Ok(()) => guard.out_of_sync = false,
                    Err(err) => guard.last_error = Some(err.to_string()),
                }
            }
        }
        self.publish().await;
        result.map_err(TimelineError::from)
    }

    /// Forks the timeline at the edited message: truncates the local
    /// sequence to end there (inclusive), replaces its content, then walks
    /// the backend through update, authoritative truncation, and
    /// regeneration. The local projection is applied before any backend
    /// call; a failure anywhere in the chain stops the remaining steps and
    /// leaves the truncation in place until the next full load.
    pub async fn edit_and_resubmit(
        &self,
        local_key: &LocalMessageId,
        new_content: &str,
        model: &str,
    ) -> Result<(), TimelineError> {
        let (conversation, cutoff) = {
            let mut guard = self.inner.lock().await;
            let Some(conversation) = guard.conversation.clone() else {
                return Ok(());
            };
            if guard.busy {
                return Err(TimelineError::Busy);
            }
            let Some(index) = guard
                .messages
                .iter()
                .position(|message| &message.local_key == local_key)
            else {
                return Ok(());
            };
            let Some(cutoff) = guard.messages[index].remote_id.clone() else {
                return Ok(());
            };
            guard.busy = true;
            guard.loading = true;
            guard.last_error = None;
            guard.messages.truncate(index + 1);
            guard.messages[index].content = new_content.to_string();
            guard.out_of_sync = true;
            (conversation, cutoff)
        };
        self.publish().await;

        let result = self
            .resubmit_chain(&conversation, &cutoff, new_content, model)
            .await;

        {
            let mut guard = self.inner.lock().await;
            guard.busy = false;
            guard.loading = false;
            if guard.conversation.as_ref() == Some(&conversation) {
                match &result {
                    Ok(reply) => {
                        guard
                            .messages
                            .push(TimelineMessage::local(Role::Assistant, reply.clone()));
                        guard.out_of_sync = false;
                    }
                    Err(err) => {
                        guard.last_error = Some(err.to_string());
                    }
                }
            }
        }
        self.publish().await;
        result.map(|_| ()).map_err(TimelineError::from)
    }

    async fn resubmit_chain(
        &self,
        conversation: &ConversationId,
        cutoff: &MessageId,
        new_content: &str,
        model: &str,
    ) -> Result<String, BridgeError> {
        self.backend.update_message(cutoff, new_content).await?;
        // backend-side truncation, so the next full reload matches the fork
        self.backend
            .truncate_conversation(conversation, cutoff)
            .await?;
        self.backend.regenerate_response(conversation, model).await
    }

    /// Drops all in-memory messages and error state unconditionally.
    pub async fn clear(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.messages.clear();
            guard.last_error = None;
            guard.out_of_sync = false;
        }
        self.publish().await;
    }

    /// Removes the binding entirely; used when the active conversation is
    /// deleted.
    pub async fn unbind(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.conversation = None;
            guard.messages.clear();
            guard.loading = false;
            guard.last_error = None;
            guard.out_of_sync = false;
        }
        self.publish().await;
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.events.send(ClientEvent::TimelineUpdated(snapshot));
    }
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
