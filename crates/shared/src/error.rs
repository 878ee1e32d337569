use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure surfaced by the backend bridge.
///
/// The bridge does not classify failures (network vs validation vs
/// backend-internal); it carries the backend's own error text unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct BridgeError {
    pub message: String,
}

impl BridgeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
