//! Blocking API.
//!
//! These types drive the async core on a small runtime owned by the
//! connection, so blocking and async callers observe the same behavior. Do not
//! call them from inside an async context; use the async types there.
//!
//! ```rust,no_run
//! use pyon_transport::blocking::PyonConnection;
//! use pyon_transport::ClientConfig;
//!
//! # fn main() -> pyon_transport::Result<()> {
//! let conn = PyonConnection::new(ClientConfig::new("127.0.0.1", 36330))?;
//! conn.open()?;
//! conn.dispatcher().execute("info")?;
//!
//! let mut reader = conn.reader();
//! if reader.read()? {
//!     println!("{}", reader.message().map(|m| m.text.as_str()).unwrap_or(""));
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::error::Result;
use crate::message::Message;
use crate::transport::{tcp_factory, TransportFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Blocking counterpart of [`crate::PyonConnection`].
///
/// Clones share the same connection and runtime; `close` on one clone
/// unblocks a `read` or `execute` pending on another thread.
#[derive(Clone)]
pub struct PyonConnection {
    inner: Arc<crate::PyonConnection>,
    runtime: Arc<Runtime>,
}

impl PyonConnection {
    /// Create a closed TCP connection.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, tcp_factory())
    }

    /// Create a closed connection over transports from `factory`.
    pub fn with_transport(config: ClientConfig, factory: TransportFactory) -> Result<Self> {
        let inner = crate::PyonConnection::with_transport(config, factory)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("pyon-io")
            .enable_all()
            .build()?;
        Ok(Self {
            inner: Arc::new(inner),
            runtime: Arc::new(runtime),
        })
    }

    pub fn open(&self) -> Result<()> {
        self.runtime.block_on(self.inner.open())
    }

    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn on_connected_changed<F>(&self, handler: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.on_connected_changed(handler);
    }

    /// The shared async connection.
    pub fn as_async(&self) -> &Arc<crate::PyonConnection> {
        &self.inner
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher {
            inner: crate::CommandDispatcher::new(Arc::clone(&self.inner)),
            runtime: Arc::clone(&self.runtime),
        }
    }

    pub fn reader(&self) -> MessageReader {
        MessageReader {
            inner: crate::MessageReader::new(Arc::clone(&self.inner)),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl std::fmt::Debug for PyonConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PyonConnection").field(&self.inner).finish()
    }
}

/// Blocking counterpart of [`crate::CommandDispatcher`].
pub struct CommandDispatcher {
    inner: crate::CommandDispatcher,
    runtime: Arc<Runtime>,
}

impl CommandDispatcher {
    /// Send `command`, returning the number of bytes written.
    pub fn execute(&self, command: &str) -> Result<usize> {
        self.runtime.block_on(self.inner.execute(command))
    }
}

/// Blocking counterpart of [`crate::MessageReader`].
pub struct MessageReader {
    inner: crate::MessageReader,
    runtime: Arc<Runtime>,
}

impl MessageReader {
    /// Read until one message is available; `false` on timeout or end of
    /// stream.
    pub fn read(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.read())
    }

    pub fn message(&self) -> Option<&Message> {
        self.inner.message()
    }

    pub fn take_message(&mut self) -> Option<Message> {
        self.inner.take_message()
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.inner.set_read_timeout(timeout);
    }
}
