//! Command dispatch: the write path.

use crate::connection::PyonConnection;
use crate::error::{PyonError, Result};
use std::sync::Arc;

/// Encode a command line for the wire.
///
/// Characters outside ASCII become `?`. A trailing `\n` is appended unless
/// the command already ends with one. An empty command encodes to nothing.
pub fn encode_command(command: &str) -> Vec<u8> {
    if command.is_empty() {
        return Vec::new();
    }

    let mut buf = Vec::with_capacity(command.len() + 1);
    buf.extend(
        command
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' }),
    );
    if !buf.ends_with(b"\n") {
        buf.push(b'\n');
    }
    buf
}

/// Writes text commands through a connection's active stream.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    connection: Arc<PyonConnection>,
}

impl CommandDispatcher {
    pub fn new(connection: Arc<PyonConnection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<PyonConnection> {
        &self.connection
    }

    /// Send `command`, returning the number of bytes written.
    ///
    /// An empty command writes nothing and returns 0. The buffer goes out in
    /// a single write; if that write fails the connection is closed and the
    /// error is returned.
    pub async fn execute(&self, command: &str) -> Result<usize> {
        if !self.connection.is_connected() {
            return Err(PyonError::NotConnected);
        }
        // The transport can be closed between the check above and here.
        let stream = self.connection.stream().ok_or(PyonError::NotConnected)?;

        let buf = encode_command(command);
        if buf.is_empty() {
            return Ok(0);
        }

        if let Err(e) = stream.write_all(&buf).await {
            tracing::warn!("Command write failed, closing connection: {}", e);
            self.connection.close_if_current(&stream);
            return Err(e.into());
        }

        tracing::trace!("Sent {} byte command", buf.len());
        Ok(buf.len())
    }
}
