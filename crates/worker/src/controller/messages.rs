//! Messages posted to a worker by the foreground application.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Controller;

/// Recognized client messages, keyed by their `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Activate this worker now instead of after the multi-tab handoff.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

impl ClientMessage {
    /// Recognize a message. Other fields alongside `type` are ignored;
    /// anything unrecognized yields `None`.
    pub fn parse(message: &Value) -> Option<Self> {
        match message.get("type").and_then(Value::as_str) {
            Some("SKIP_WAITING") => Some(ClientMessage::SkipWaiting),
            _ => None,
        }
    }
}

impl Controller {
    /// Handle a posted message. Returns whether it was recognized.
    pub fn handle_message(&self, message: &Value) -> bool {
        match ClientMessage::parse(message) {
            Some(ClientMessage::SkipWaiting) => {
                self.skip_waiting();
                true
            }
            None => {
                tracing::debug!(version = %self.version(), %message, "ignoring unrecognized message");
                false
            }
        }
    }
}
