//! Client configuration.

use crate::error::{PyonError, Result};
use crate::protocol::PayloadMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default command port of the Folding@home client daemon.
pub const DEFAULT_PORT: u16 = 36330;

/// Default connect budget in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default per-attempt read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10000;

/// Default size of a single socket read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Options recognized by a PyON connection and its reader.
///
/// ```
/// use pyon_transport::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("127.0.0.1", 36330)
///     .with_read_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host name or address of the command server.
    pub host: String,
    /// TCP port of the command server.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Budget for a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Budget for a single read attempt.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Bytes requested per socket read.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Upper bound on buffered bytes while waiting for a complete message.
    /// `None` leaves the buffer unbounded.
    #[serde(default)]
    pub max_buffer_size: Option<usize>,
    /// Which span of a framed message becomes the payload.
    #[serde(default)]
    pub payload_mode: PayloadMode,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl ClientConfig {
    /// Create a configuration with default timeouts and buffer sizes.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_buffer_size: None,
            payload_mode: PayloadMode::default(),
        }
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// A numeric `port` outside `0..=65535` is an `InvalidArgument`; other
    /// malformed documents are JSON errors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(port) = value.get("port").filter(|port| port.is_number()) {
            if port.as_u64().and_then(|port| u16::try_from(port).ok()).is_none() {
                return Err(PyonError::invalid_argument(format!("port out of range: {port}")));
            }
        }
        let config: ClientConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the connect budget.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Set the per-attempt read budget.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Set the number of bytes requested per socket read.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Bound the accumulation buffer.
    pub fn with_max_buffer_size(mut self, limit: usize) -> Self {
        self.max_buffer_size = Some(limit);
        self
    }

    /// Select canonical or converted payloads.
    pub fn with_payload_mode(mut self, mode: PayloadMode) -> Self {
        self.payload_mode = mode;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Check the options a connection cannot work without.
    ///
    /// The port needs no check: every `u16` is a valid port.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PyonError::invalid_argument("host must not be empty"));
        }
        if self.read_buffer_size == 0 {
            return Err(PyonError::invalid_argument(
                "read buffer size must be greater than zero",
            ));
        }
        if self.max_buffer_size == Some(0) {
            return Err(PyonError::config("max buffer size must be greater than zero"));
        }
        Ok(())
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
