//! `Stream` adapter over a [`MessageReader`].

use crate::error::Result;
use crate::message::Message;
use crate::reader::{MessageReader, ReadOutcome};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of messages read from one connection.
///
/// Read timeouts are skipped. The stream ends when the peer closes its end,
/// or right after yielding the first error.
pub struct MessageStream {
    inner: BoxStream<'static, Result<Message>>,
    completed: bool,
}

impl MessageStream {
    pub(crate) fn new(reader: MessageReader) -> Self {
        let inner = stream::unfold(Some(reader), |reader| async move {
            let mut reader = reader?;
            loop {
                match reader.read_outcome().await {
                    Ok(ReadOutcome::Message) => {
                        let message = reader.take_message()?;
                        return Some((Ok(message), Some(reader)));
                    }
                    Ok(ReadOutcome::TimedOut) => continue,
                    Ok(ReadOutcome::EndOfStream) => return None,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        });

        Self {
            inner: inner.boxed(),
            completed: false,
        }
    }
}

impl MessageReader {
    /// Turn this reader into a [`Stream`] of messages.
    pub fn into_stream(self) -> MessageStream {
        MessageStream::new(self)
    }
}

impl Stream for MessageStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.completed {
            return Poll::Ready(None);
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(result)) => {
                if result.is_err() {
                    self.completed = true;
                }
                Poll::Ready(Some(result))
            }
            Poll::Ready(None) => {
                self.completed = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
