//! # pyon-transport
//!
//! A client for the line-framed PyON command protocol spoken by the
//! Folding@home client daemon on its command port.
//!
//! ## Overview
//!
//! The client opens a TCP socket, writes text commands, and reassembles the
//! daemon's asynchronously produced messages from an arbitrary stream of
//! partial reads. It is built from four pieces:
//!
//! - [`PyonConnection`]: open/closed state machine over an owned transport,
//!   with connect timeout and connected-changed notifications
//! - [`CommandDispatcher`]: the write path
//! - [`MessageReader`]: the timeout-aware read loop
//! - [`protocol::PyonFramer`]: the pure framing algorithm
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pyon_transport::{ClientConfig, CommandDispatcher, MessageReader, PyonConnection, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conn = Arc::new(PyonConnection::new(ClientConfig::new("127.0.0.1", 36330))?);
//!     conn.open().await?;
//!
//!     CommandDispatcher::new(Arc::clone(&conn)).execute("info").await?;
//!
//!     let mut reader = MessageReader::new(conn);
//!     while reader.read().await? {
//!         if let Some(msg) = reader.take_message() {
//!             println!("{}: {}", msg.message_type(), msg.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pyon_transport::{ClientConfig, MessageReader, PyonConnection, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conn = Arc::new(PyonConnection::new(ClientConfig::new("127.0.0.1", 36330))?);
//!     conn.open().await?;
//!
//!     let mut messages = MessageReader::new(conn).into_stream();
//!     while let Some(msg) = messages.next().await {
//!         println!("{}", msg?.identifier);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Low-Level API
//!
//! ```rust
//! use bytes::BytesMut;
//! use pyon_transport::protocol::{PayloadMode, PyonFramer};
//!
//! let framer = PyonFramer::new(PayloadMode::Converted);
//! let mut buf = BytesMut::from(&b"PyON 1 options\n{\"paused\": False}\n---\n"[..]);
//!
//! match framer.extract(&mut buf) {
//!     Some(msg) => assert_eq!(msg.text, "{\"paused\": false}"),
//!     None => println!("Need more data"),
//! }
//! ```
//!
//! ## Protocol
//!
//! ```text
//! PyON 1 <message-type><CRLF|LF><payload><CRLF|LF>---<CRLF|LF>
//! ```
//!
//! Commands are single lines of ASCII text terminated by `\n`.

pub mod blocking;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod message_stream;
pub mod protocol;
pub mod reader;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::CommandDispatcher;
pub use config::ClientConfig;
pub use connection::PyonConnection;
pub use error::{PyonError, Result};
pub use message::{Message, MessageIdentifier};
pub use message_stream::MessageStream;
pub use protocol::{PayloadMode, PyonFramer};
pub use reader::{MessageReader, ReadOutcome};
