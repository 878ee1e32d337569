use std::sync::Arc;

use shared::{domain::ConversationId, error::BridgeError, protocol::ConversationSummary};
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use crate::{backend::ChatBackend, ClientEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct DirectorySnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub loading: bool,
    pub last_error: Option<String>,
    /// Set when an optimistic removal outlived a failed backend delete;
    /// cleared by the next successful refresh.
    pub out_of_sync: bool,
}

#[derive(Default)]
struct DirectoryState {
    conversations: Vec<ConversationSummary>,
    loading: bool,
    last_error: Option<String>,
    out_of_sync: bool,
}

impl DirectoryState {
    fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot {
            conversations: self.conversations.clone(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            out_of_sync: self.out_of_sync,
        }
    }
}

/// Owns the conversation list and keeps the local cache and the backend in
/// agreement: refresh is always a full fetch-and-replace, create and rename
/// reload after writing, delete removes locally first and accepts the
/// divergence window if the backend call then fails.
pub struct ConversationDirectory {
    backend: Arc<dyn ChatBackend>,
    inner: Mutex<DirectoryState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ConversationDirectory {
    pub fn new(backend: Arc<dyn ChatBackend>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            backend,
            inner: Mutex::new(DirectoryState::default()),
            events,
        }
    }

    pub async fn snapshot(&self) -> DirectorySnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Full fetch-and-replace of the conversation set. No pagination, no
    /// partial merge; failure leaves the cache untouched.
    pub async fn refresh(&self) -> Result<(), BridgeError> {
        {
            let mut guard = self.inner.lock().await;
            guard.loading = true;
        }
        self.publish().await;

        let result = self.backend.list_conversations().await;

        let outcome = {
            let mut guard = self.inner.lock().await;
            guard.loading = false;
            match result {
                Ok(conversations) => {
                    guard.conversations = conversations;
                    guard.last_error = None;
                    guard.out_of_sync = false;
                    Ok(())
                }
                Err(err) => {
                    guard.last_error = Some(err.to_string());
                    Err(err)
                }
            }
        };
        self.publish().await;
        outcome
    }

    /// Creates a conversation and reloads the full list so the returned
    /// backend-assigned id is authoritative before the caller uses it.
    /// Retrying a failed create makes a second conversation; there is no
    /// dedup key.
    pub async fn create(&self, title: &str, model: &str) -> Result<ConversationId, BridgeError> {
        let id = match self.backend.create_conversation(title, model).await {
            Ok(id) => id,
            Err(err) => {
                self.record_error(&err).await;
                return Err(err);
            }
        };

        // read-after-write via full reload; a reload failure is already
        // recorded on the directory state and does not undo the create
        if let Err(err) = self.refresh().await {
            warn!("conversation list reload after create failed: {err}");
        }
        Ok(id)
    }

    /// Removes the conversation from the cache immediately, then tells the
    /// backend. A backend failure is surfaced but the removal is not rolled
    /// back within this operation.
    pub async fn delete(&self, id: &ConversationId) -> Result<(), BridgeError> {
        {
            let mut guard = self.inner.lock().await;
            guard.conversations.retain(|conversation| &conversation.id != id);
        }
        self.publish().await;

        if let Err(err) = self.backend.delete_conversation(id).await {
            {
                let mut guard = self.inner.lock().await;
                guard.last_error = Some(err.to_string());
                guard.out_of_sync = true;
            }
            self.publish().await;
            return Err(err);
        }
        Ok(())
    }

    pub async fn rename(&self, id: &ConversationId, title: &str) -> Result<(), BridgeError> {
        if let Err(err) = self.backend.rename_conversation(id, title).await {
            self.record_error(&err).await;
            return Err(err);
        }

        if let Err(err) = self.refresh().await {
            warn!("conversation list reload after rename failed: {err}");
        }
        Ok(())
    }

    async fn record_error(&self, err: &BridgeError) {
        {
            let mut guard = self.inner.lock().await;
            guard.last_error = Some(err.to_string());
        }
        self.publish().await;
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.events.send(ClientEvent::DirectoryUpdated(snapshot));
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
