//! Connection lifecycle for a PyON command server.
//!
//! A [`PyonConnection`] is either closed or open. It owns at most one
//! [`Transport`] at a time, and a closed transport is never reused: every
//! [`open`](PyonConnection::open) builds a fresh one from the factory.
//! Connection state is always read from the live transport, never cached.

use crate::config::ClientConfig;
use crate::error::{PyonError, Result};
use crate::transport::{tcp_factory, Transport, TransportFactory, TransportStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked with the new connected flag on every state change.
pub type ConnectedHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Open/closed state machine over an owned transport.
///
/// Shared between reader and writer roles behind an `Arc`. Closing from one
/// task while another is blocked reading or writing is supported and fails
/// the blocked call with a transport error.
pub struct PyonConnection {
    config: ClientConfig,
    factory: TransportFactory,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    handlers: Mutex<Vec<ConnectedHandler>>,
}

impl PyonConnection {
    /// Create a closed TCP connection for `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, tcp_factory())
    }

    /// Create a closed connection that opens transports from `factory`.
    pub fn with_transport(config: ClientConfig, factory: TransportFactory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            transport: Mutex::new(None),
            handlers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Register a handler for connected-changed notifications.
    pub fn on_connected_changed<F>(&self, handler: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.handlers).push(Arc::new(handler));
    }

    /// Connect a fresh transport.
    ///
    /// Fails with `AlreadyOpen` when open. On failure the connection stays
    /// closed and no notification fires.
    pub async fn open(&self) -> Result<()> {
        let stale = {
            let mut slot = lock(&self.transport);
            if slot.as_ref().is_some_and(|transport| transport.is_connected()) {
                return Err(PyonError::AlreadyOpen);
            }
            slot.take()
        };
        if let Some(stale) = stale {
            tracing::debug!("Discarding stale transport");
            stale.close();
        }

        let mut transport = (self.factory)();
        if let Err(e) = transport
            .connect(&self.config.host, self.config.port, self.config.connect_timeout())
            .await
        {
            tracing::debug!("Connect to {}:{} failed: {}", self.config.host, self.config.port, e);
            transport.close();
            return Err(e);
        }

        *lock(&self.transport) = Some(Arc::from(transport));
        tracing::debug!("Connected to {}:{}", self.config.host, self.config.port);
        self.notify(true);
        Ok(())
    }

    /// Close the transport. A no-op when already closed.
    pub fn close(&self) {
        let transport = lock(&self.transport).take();
        if let Some(transport) = transport {
            self.shut_down(transport);
        }
    }

    /// Close only if `stream` belongs to the transport owned right now.
    ///
    /// I/O paths use this after a failure so that an error on a stream from
    /// an earlier open never tears down a transport opened since. Returns
    /// whether a close happened.
    pub fn close_if_current(&self, stream: &Arc<dyn TransportStream>) -> bool {
        let transport = {
            let mut slot = lock(&self.transport);
            let current = slot
                .as_ref()
                .and_then(|transport| transport.stream())
                .is_some_and(|live| std::ptr::addr_eq(Arc::as_ptr(&live), Arc::as_ptr(stream)));
            if !current {
                tracing::debug!("Ignoring failure on a stream that is no longer current");
                return false;
            }
            slot.take()
        };
        match transport {
            Some(transport) => {
                self.shut_down(transport);
                true
            }
            None => false,
        }
    }

    fn shut_down(&self, transport: Arc<dyn Transport>) {
        let was_connected = transport.is_connected();
        transport.close();
        if was_connected && !transport.is_connected() {
            tracing::debug!("Closed connection to {}:{}", self.config.host, self.config.port);
            self.notify(false);
        }
    }

    /// Whether the owned transport currently reports connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.transport)
            .as_ref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// The active stream, or `None` when closed.
    pub fn stream(&self) -> Option<Arc<dyn TransportStream>> {
        lock(&self.transport)
            .as_ref()
            .and_then(|transport| transport.stream())
    }

    fn notify(&self, connected: bool) {
        let handlers = lock(&self.handlers).clone();
        for handler in handlers {
            handler(connected);
        }
    }
}

impl Drop for PyonConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PyonConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyonConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ConnectFailure, MockWire};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn connection(wire: &MockWire) -> PyonConnection {
        PyonConnection::with_transport(ClientConfig::new("fah.local", 36330), wire.factory()).unwrap()
    }

    fn count_events(conn: &PyonConnection) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let (o, c) = (Arc::clone(&opened), Arc::clone(&closed));
        conn.on_connected_changed(move |connected| {
            if connected {
                o.fetch_add(1, Ordering::SeqCst);
            } else {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (opened, closed)
    }

    #[test]
    fn test_empty_host_rejected_at_construction() {
        let wire = MockWire::new();
        let result = PyonConnection::with_transport(ClientConfig::new("", 36330), wire.factory());
        assert!(matches!(result, Err(PyonError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_open_fires_once() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (opened, closed) = count_events(&conn);

        assert!(!conn.is_connected());
        assert!(conn.stream().is_none());
        conn.open().await.unwrap();
        assert!(conn.is_connected());
        assert!(conn.stream().is_some());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_twice_is_already_open() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (opened, _) = count_events(&conn);

        conn.open().await.unwrap();
        let result = conn.open().await;
        assert!(matches!(result, Err(PyonError::AlreadyOpen)));
        assert!(conn.is_connected());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(wire.connects(), 1);
    }

    #[tokio::test]
    async fn test_repeated_close_fires_once() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (_, closed) = count_events(&conn);

        conn.open().await.unwrap();
        conn.close();
        conn.close();
        conn.close();
        assert!(!conn.is_connected());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_without_open_is_silent() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (opened, closed) = count_events(&conn);
        conn.close();
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reopen_uses_fresh_transport() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (opened, closed) = count_events(&conn);

        conn.open().await.unwrap();
        conn.close();
        conn.open().await.unwrap();
        assert!(conn.is_connected());
        assert_eq!(wire.connects(), 2);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_stays_closed_without_notification() {
        let wire = MockWire::new();
        wire.fail_next_connect(ConnectFailure::Timeout);
        let conn = connection(&wire);
        let (opened, closed) = count_events(&conn);

        let result = conn.open().await;
        assert!(matches!(result, Err(PyonError::Timeout(_))));
        assert!(!conn.is_connected());
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        conn.open().await.unwrap();
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_refused_open_is_transport_error() {
        let wire = MockWire::new();
        wire.fail_next_connect(ConnectFailure::Refused);
        let conn = connection(&wire);
        let result = conn.open().await;
        assert!(matches!(result, Err(PyonError::Transport(_))));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_close_if_current_matches_live_stream() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (_, closed) = count_events(&conn);

        conn.open().await.unwrap();
        let stream = conn.stream().unwrap();
        assert!(conn.close_if_current(&stream));
        assert!(!conn.is_connected());
        assert!(!conn.close_if_current(&stream));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_if_current_ignores_stream_from_earlier_open() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (opened, closed) = count_events(&conn);

        conn.open().await.unwrap();
        let old = conn.stream().unwrap();
        conn.close();
        conn.open().await.unwrap();

        assert!(!conn.close_if_current(&old));
        assert!(conn.is_connected());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_closes() {
        let wire = MockWire::new();
        let conn = connection(&wire);
        let (_, closed) = count_events(&conn);
        conn.open().await.unwrap();
        drop(conn);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
