//! Error types for the PyON client.

use std::fmt;
use std::io;
use std::time::Duration;

/// Result type alias for PyON operations.
pub type Result<T> = std::result::Result<T, PyonError>;

/// Errors that can occur when talking to a PyON command server.
///
/// "No message yet", "no data before the read timeout" and "stream ended"
/// are not errors; the reader reports them as a `false` return.
#[derive(Debug, thiserror::Error)]
pub enum PyonError {
    /// Malformed constructor or configuration input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `open` was called on a connection that is already open.
    #[error("Connection is already open")]
    AlreadyOpen,

    /// The connection is closed, or its stream vanished underneath the call.
    #[error("Not connected")]
    NotConnected,

    /// A connect attempt exceeded its budget.
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// I/O fault on the underlying socket. The owning connection has been
    /// closed by the time this reaches the caller.
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    /// Transport operation issued in the wrong state.
    #[error("Invalid transport state: {0}")]
    InvalidState(String),

    /// Transport was used after it was closed.
    #[error("Transport has been closed")]
    Disposed,

    /// The accumulation buffer outgrew its configured limit without
    /// producing a complete message.
    #[error("Frame too large: {size} bytes buffered, limit is {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error, raised while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PyonError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        PyonError::InvalidArgument(msg.to_string())
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl fmt::Display) -> Self {
        PyonError::InvalidState(msg.to_string())
    }

    /// Create a configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        PyonError::Config(msg.to_string())
    }

    /// Whether the error came from the socket layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, PyonError::Transport(_))
    }
}
