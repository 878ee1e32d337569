use std::{collections::HashSet, sync::Arc, time::Duration};

use shared::{domain::ConnectionState, protocol::ModelDescriptor};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::debug;

use crate::{backend::ChatBackend, ClientEvent};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub models: Vec<ModelDescriptor>,
    pub selected_model: Option<String>,
}

struct MonitorState {
    state: ConnectionState,
    models: Vec<ModelDescriptor>,
    selected_model: Option<String>,
    stopped: bool,
}

impl MonitorState {
    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.state,
            models: self.models.clone(),
            selected_model: self.selected_model.clone(),
        }
    }
}

/// Periodic backend health and model-list poller.
///
/// Selection rule: an empty selection is filled from the first entry of a
/// freshly fetched list; an explicit selection is never overridden or
/// cleared, even when the list no longer contains it.
pub struct ConnectionMonitor {
    backend: Arc<dyn ChatBackend>,
    poll_interval: Duration,
    inner: Mutex<MonitorState>,
    events: broadcast::Sender<ClientEvent>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionMonitor {
    pub fn new(backend: Arc<dyn ChatBackend>, events: broadcast::Sender<ClientEvent>) -> Arc<Self> {
        Self::with_poll_interval(backend, events, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        backend: Arc<dyn ChatBackend>,
        events: broadcast::Sender<ClientEvent>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            poll_interval,
            inner: Mutex::new(MonitorState {
                state: ConnectionState::Checking,
                models: Vec::new(),
                selected_model: None,
                stopped: false,
            }),
            events,
            poll_task: Mutex::new(None),
        })
    }

    /// Polls immediately, then on every interval tick. Starting again
    /// replaces the previous poll task.
    pub async fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.poll_interval);
            loop {
                ticker.tick().await;
                monitor.poll_once().await;
            }
        });

        let previous = self.poll_task.lock().await.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops future polls. A poll already in flight may complete but its
    /// result is discarded.
    pub async fn stop(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.stopped = true;
        }
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }
    }

    pub async fn poll_once(&self) {
        let live = match self.backend.check_connection().await {
            Ok(live) => live,
            Err(err) => {
                debug!("connection check failed: {err}");
                false
            }
        };

        if !live {
            // previous model list may stay on display while down
            self.apply_poll(ConnectionState::Disconnected, None).await;
            return;
        }

        match self.backend.list_models().await {
            Ok(models) => {
                self.apply_poll(ConnectionState::Connected, Some(dedupe_by_name(models)))
                    .await;
            }
            Err(err) => {
                debug!("model listing failed while live: {err}");
                self.apply_poll(ConnectionState::Disconnected, None).await;
            }
        }
    }

    /// Explicit user choice; the poller will not touch it afterwards.
    pub async fn select_model(&self, name: impl Into<String>) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            guard.selected_model = Some(name.into());
            guard.snapshot()
        };
        let _ = self.events.send(ClientEvent::ConnectionUpdated(snapshot));
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn selected_model(&self) -> Option<String> {
        self.inner.lock().await.selected_model.clone()
    }

    pub async fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.lock().await.snapshot()
    }

    async fn apply_poll(&self, state: ConnectionState, models: Option<Vec<ModelDescriptor>>) {
        let snapshot = {
            let mut guard = self.inner.lock().await;
            if guard.stopped {
                // torn down while this poll was in flight
                return;
            }
            guard.state = state;
            if let Some(models) = models {
                guard.models = models;
                if guard.selected_model.is_none() {
                    guard.selected_model = guard.models.first().map(|model| model.name.clone());
                }
            }
            guard.snapshot()
        };
        let _ = self.events.send(ClientEvent::ConnectionUpdated(snapshot));
    }
}

fn dedupe_by_name(models: Vec<ModelDescriptor>) -> Vec<ModelDescriptor> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .filter(|model| seen.insert(model.name.clone()))
        .collect()
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
