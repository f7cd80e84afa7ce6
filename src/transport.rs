//! Transport layer abstraction for the PyON client.
//!
//! A [`Transport`] owns one socket for its whole life: it connects once,
//! hands out a shared [`TransportStream`] while connected, and is discarded
//! after [`Transport::close`]. Closing wakes every read or write pending on
//! the stream with `ErrorKind::ConnectionAborted`, which is how a close from
//! another task terminates a blocked reader.

use crate::error::{PyonError, Result};
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;

/// Readable and writable byte stream of a connected transport.
#[async_trait]
pub trait TransportStream: Send + Sync {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer ended the stream.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole of `data` and flush it. Writes are serialized per
    /// stream, so concurrent callers never interleave on the wire.
    async fn write_all(&self, data: &[u8]) -> io::Result<()>;
}

/// Raw socket wrapper owned by a connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve `host` and connect within `timeout`.
    ///
    /// Fails with `InvalidState` if already connected, `InvalidArgument` for
    /// an empty host, `Timeout` when the budget runs out and `Disposed` after
    /// [`close`](Transport::close). A timed out attempt leaves no socket
    /// behind.
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()>;

    /// Close the socket and wake pending I/O. Idempotent.
    fn close(&self);

    fn is_connected(&self) -> bool;

    /// The open stream, or `None` when not connected.
    fn stream(&self) -> Option<Arc<dyn TransportStream>>;
}

/// Creates a fresh transport for every open.
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Factory producing [`TcpTransport`]s.
pub fn tcp_factory() -> TransportFactory {
    Arc::new(|| Box::new(TcpTransport::new()) as Box<dyn Transport>)
}

/// Error surfaced by I/O interrupted through a close.
pub(crate) fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transport closed")
}

/// Resolves once `closed` flips to true, or its sender is gone.
pub(crate) async fn wait_closed(mut closed: watch::Receiver<bool>) {
    // A dropped sender means the transport is gone, which counts as closed.
    let _ = closed.wait_for(|closed| *closed).await;
}

/// TCP stream split into owned halves, each behind its own lock.
pub struct TcpTransportStream {
    read: tokio::sync::Mutex<OwnedReadHalf>,
    write: tokio::sync::Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
}

impl TcpTransportStream {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Self {
            read: tokio::sync::Mutex::new(read),
            write: tokio::sync::Mutex::new(write),
            closed,
        }
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl TransportStream for TcpTransportStream {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(aborted());
        }

        tokio::select! {
            result = async {
                let mut read = self.read.lock().await;
                read.read(buf).await
            } => result,
            _ = wait_closed(closed) => Err(aborted()),
        }
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(aborted());
        }

        tokio::select! {
            result = async {
                let mut write = self.write.lock().await;
                write.write_all(data).await?;
                write.flush().await
            } => result,
            _ = wait_closed(closed) => Err(aborted()),
        }
    }
}

#[derive(Default)]
struct TcpState {
    stream: Option<Arc<TcpTransportStream>>,
    disposed: bool,
}

/// Production transport over a tokio `TcpStream`.
#[derive(Default)]
pub struct TcpTransport {
    state: Mutex<TcpState>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        {
            let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
            if state.disposed {
                return Err(PyonError::Disposed);
            }
            if state.stream.is_some() {
                return Err(PyonError::invalid_state("transport is already connected"));
            }
        }
        if host.trim().is_empty() {
            return Err(PyonError::invalid_argument("host must not be empty"));
        }

        tracing::debug!("Connecting to {}:{} (timeout {:?})", host, port, timeout);
        // Dropping the connect future on timeout drops any half-open socket.
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(PyonError::Timeout(timeout)),
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.stream = Some(Arc::new(TcpTransportStream::new(stream)));
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.disposed = true;
        if let Some(stream) = state.stream.take() {
            stream.close();
        }
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.stream.as_ref().is_some_and(|stream| !stream.is_closed())
    }

    fn stream(&self) -> Option<Arc<dyn TransportStream>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .stream
            .as_ref()
            .filter(|stream| !stream.is_closed())
            .map(|stream| Arc::clone(stream) as Arc<dyn TransportStream>)
    }
}
