pub mod backend;
pub mod connection;
pub mod directory;
pub mod settings;
pub mod timeline;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{ChatBackend, MissingBackend};
pub use connection::{ConnectionMonitor, ConnectionSnapshot, DEFAULT_POLL_INTERVAL};
pub use directory::{ConversationDirectory, DirectorySnapshot};
pub use settings::{Preferences, SettingsStore, DEFAULT_THEME, PREFERENCES_FILE};
pub use timeline::{MessageTimeline, TimelineError, TimelineMessage, TimelineSnapshot};
pub use transport::HttpBackend;

/// State-change notifications for the view layer. State flows one way:
/// components mutate, publish a snapshot, and the view renders it.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    ConnectionUpdated(ConnectionSnapshot),
    DirectoryUpdated(DirectorySnapshot),
    TimelineUpdated(TimelineSnapshot),
}
