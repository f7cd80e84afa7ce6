//! Timeout-aware read loop feeding the PyON framer.

use crate::connection::PyonConnection;
use crate::error::{PyonError, Result};
use crate::message::Message;
use crate::protocol::PyonFramer;
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;

/// What a single read attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete message was extracted and stored.
    Message,
    /// No data arrived within the read timeout.
    TimedOut,
    /// The peer ended the stream.
    EndOfStream,
}

/// Reads from a connection's stream into a private accumulation buffer until
/// the framer yields a message.
///
/// The buffer only shrinks when a message is consumed; timeouts and partial
/// reads leave it intact for the next call.
#[derive(Debug)]
pub struct MessageReader {
    connection: Arc<PyonConnection>,
    framer: PyonFramer,
    buffer: BytesMut,
    chunk: Vec<u8>,
    read_timeout: Duration,
    max_buffer_size: Option<usize>,
    message: Option<Message>,
}

impl MessageReader {
    /// Create a reader using the connection's configured timeout, read size,
    /// buffer limit and payload mode.
    pub fn new(connection: Arc<PyonConnection>) -> Self {
        let config = connection.config();
        let framer = PyonFramer::new(config.payload_mode);
        let chunk = vec![0u8; config.read_buffer_size];
        let read_timeout = config.read_timeout();
        let max_buffer_size = config.max_buffer_size;
        Self {
            connection,
            framer,
            buffer: BytesMut::new(),
            chunk,
            read_timeout,
            max_buffer_size,
            message: None,
        }
    }

    /// Override the per-attempt read timeout.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn connection(&self) -> &Arc<PyonConnection> {
        &self.connection
    }

    /// The most recently extracted message.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Take the most recently extracted message.
    pub fn take_message(&mut self) -> Option<Message> {
        self.message.take()
    }

    /// Bytes received but not yet consumed by a message.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Read until one message is available.
    ///
    /// Returns `Ok(true)` with the message stored in
    /// [`message`](Self::message), or `Ok(false)` when the read timed out or
    /// the stream ended. I/O errors close the connection and are returned.
    pub async fn read(&mut self) -> Result<bool> {
        Ok(self.read_outcome().await? == ReadOutcome::Message)
    }

    /// Like [`read`](Self::read), but tells a timeout apart from end of stream.
    pub async fn read_outcome(&mut self) -> Result<ReadOutcome> {
        if !self.connection.is_connected() {
            return Err(PyonError::NotConnected);
        }

        // A previous read may have delivered more than one message.
        if self.try_extract() {
            return Ok(ReadOutcome::Message);
        }

        let stream = self.connection.stream().ok_or(PyonError::NotConnected)?;
        loop {
            let n = match tokio::time::timeout(self.read_timeout, stream.read(&mut self.chunk)).await {
                Err(_) => {
                    tracing::trace!("No data within {:?}", self.read_timeout);
                    return Ok(ReadOutcome::TimedOut);
                }
                Ok(Ok(0)) => {
                    tracing::debug!("Stream ended with {} bytes buffered", self.buffer.len());
                    return Ok(ReadOutcome::EndOfStream);
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    tracing::warn!("Read failed, closing connection: {}", e);
                    self.connection.close_if_current(&stream);
                    return Err(e.into());
                }
            };

            self.buffer.extend_from_slice(&self.chunk[..n]);
            tracing::trace!("Read {} bytes, {} buffered", n, self.buffer.len());

            if self.try_extract() {
                return Ok(ReadOutcome::Message);
            }

            if let Some(limit) = self.max_buffer_size {
                if self.buffer.len() > limit {
                    let size = self.buffer.len();
                    tracing::warn!("Buffered {} bytes without a complete message", size);
                    self.connection.close_if_current(&stream);
                    return Err(PyonError::FrameTooLarge { size, limit });
                }
            }
        }
    }

    fn try_extract(&mut self) -> bool {
        match self.framer.extract(&mut self.buffer) {
            Some(message) => {
                self.message = Some(message);
                true
            }
            None => false,
        }
    }
}
