//! Message types produced by the PyON framer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a received message: its type token and arrival time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageIdentifier {
    /// Type token from the `PyON 1 <type>` header line (e.g. `info`, `units`).
    pub message_type: String,
    /// When the framer recognized the message.
    pub received_utc: DateTime<Utc>,
}

impl MessageIdentifier {
    /// Create an identifier stamped with the current time.
    pub fn now(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            received_utc: Utc::now(),
        }
    }
}

impl fmt::Display for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.message_type, self.received_utc.to_rfc3339())
    }
}

/// A complete message extracted from the wire.
///
/// `text` holds either the whole framed block or just the converted body,
/// depending on the [`PayloadMode`](crate::protocol::PayloadMode) the framer
/// ran with. Interpreting it per message type is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub identifier: MessageIdentifier,
    pub text: String,
}

impl Message {
    pub fn new(identifier: MessageIdentifier, text: String) -> Self {
        Self { identifier, text }
    }

    /// The type token of this message.
    pub fn message_type(&self) -> &str {
        &self.identifier.message_type
    }

    /// Parse the payload as JSON.
    ///
    /// Only meaningful for converted payloads, which carry JSON literals.
    pub fn text_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.text).ok()
    }
}
