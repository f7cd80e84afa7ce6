//! Scripted in-memory transport for unit tests.

use crate::error::{PyonError, Result};
use crate::transport::{aborted, wait_closed, Transport, TransportFactory, TransportStream};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectFailure {
    Timeout,
    Refused,
}

enum MockRead {
    Data(Vec<u8>),
    Eof,
    Error(io::ErrorKind),
}

struct WireInner {
    connects: AtomicUsize,
    connect_failures: Mutex<VecDeque<ConnectFailure>>,
    reads_tx: mpsc::UnboundedSender<MockRead>,
    reads_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockRead>>,
    leftover: Mutex<Vec<u8>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_calls: AtomicUsize,
    write_error: Mutex<Option<io::ErrorKind>>,
    hold_writes: AtomicBool,
}

/// Script shared by every transport a test connection opens.
///
/// Reads pend until data is pushed, so an empty script exercises the read
/// timeout.
#[derive(Clone)]
pub(crate) struct MockWire {
    inner: Arc<WireInner>,
}

impl MockWire {
    pub(crate) fn new() -> Self {
        let (reads_tx, reads_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(WireInner {
                connects: AtomicUsize::new(0),
                connect_failures: Mutex::new(VecDeque::new()),
                reads_tx,
                reads_rx: tokio::sync::Mutex::new(reads_rx),
                leftover: Mutex::new(Vec::new()),
                writes: Mutex::new(Vec::new()),
                write_calls: AtomicUsize::new(0),
                write_error: Mutex::new(None),
                hold_writes: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn factory(&self) -> TransportFactory {
        let wire = self.clone();
        Arc::new(move || Box::new(MockTransport::new(wire.clone())) as Box<dyn Transport>)
    }

    pub(crate) fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_next_connect(&self, failure: ConnectFailure) {
        self.inner.connect_failures.lock().unwrap().push_back(failure);
    }

    pub(crate) fn push_read(&self, data: &[u8]) {
        self.inner.reads_tx.send(MockRead::Data(data.to_vec())).unwrap();
    }

    pub(crate) fn push_eof(&self) {
        self.inner.reads_tx.send(MockRead::Eof).unwrap();
    }

    pub(crate) fn push_read_error(&self, kind: io::ErrorKind) {
        self.inner.reads_tx.send(MockRead::Error(kind)).unwrap();
    }

    pub(crate) fn fail_writes(&self, kind: io::ErrorKind) {
        *self.inner.write_error.lock().unwrap() = Some(kind);
    }

    /// While set, new writes pend until their transport closes, then fail.
    pub(crate) fn hold_writes(&self, hold: bool) {
        self.inner.hold_writes.store(hold, Ordering::SeqCst);
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.inner.write_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.writes.lock().unwrap().clone()
    }
}

struct MockTransport {
    wire: MockWire,
    stream: Mutex<Option<Arc<MockStream>>>,
    closed: watch::Sender<bool>,
}

impl MockTransport {
    fn new(wire: MockWire) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            wire,
            stream: Mutex::new(None),
            closed,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _host: &str, _port: u16, timeout: Duration) -> Result<()> {
        if *self.closed.borrow() {
            return Err(PyonError::Disposed);
        }
        self.wire.inner.connects.fetch_add(1, Ordering::SeqCst);
        let failure = self.wire.inner.connect_failures.lock().unwrap().pop_front();
        match failure {
            Some(ConnectFailure::Timeout) => Err(PyonError::Timeout(timeout)),
            Some(ConnectFailure::Refused) => {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into())
            }
            None => {
                let stream = MockStream {
                    wire: self.wire.clone(),
                    closed: self.closed.subscribe(),
                };
                *self.stream.get_mut().unwrap() = Some(Arc::new(stream));
                Ok(())
            }
        }
    }

    fn close(&self) {
        self.closed.send_replace(true);
        self.stream.lock().unwrap().take();
    }

    fn is_connected(&self) -> bool {
        self.stream.lock().unwrap().is_some()
    }

    fn stream(&self) -> Option<Arc<dyn TransportStream>> {
        self.stream
            .lock()
            .unwrap()
            .as_ref()
            .map(|stream| Arc::clone(stream) as Arc<dyn TransportStream>)
    }
}

struct MockStream {
    wire: MockWire,
    closed: watch::Receiver<bool>,
}

impl MockStream {
    fn serve(leftover: &mut Vec<u8>, data: Vec<u8>, buf: &mut [u8]) -> usize {
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        leftover.extend_from_slice(&data[n..]);
        n
    }

    fn take_leftover(&self, buf: &mut [u8]) -> Option<usize> {
        let mut leftover = self.wire.inner.leftover.lock().unwrap();
        if leftover.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut *leftover);
        Some(Self::serve(&mut leftover, data, buf))
    }
}

#[async_trait]
impl TransportStream for MockStream {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.closed.borrow() {
            return Err(aborted());
        }
        if let Some(n) = self.take_leftover(buf) {
            return Ok(n);
        }

        let next = tokio::select! {
            next = async { self.wire.inner.reads_rx.lock().await.recv().await } => next,
            _ = wait_closed(self.closed.clone()) => return Err(aborted()),
        };
        match next {
            Some(MockRead::Data(data)) => {
                let mut leftover = self.wire.inner.leftover.lock().unwrap();
                Ok(Self::serve(&mut leftover, data, buf))
            }
            Some(MockRead::Eof) => Ok(0),
            Some(MockRead::Error(kind)) => Err(io::Error::new(kind, "scripted read failure")),
            None => Err(aborted()),
        }
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.wire.inner.write_calls.fetch_add(1, Ordering::SeqCst);
        if *self.closed.borrow() {
            return Err(aborted());
        }
        if self.wire.inner.hold_writes.load(Ordering::SeqCst) {
            wait_closed(self.closed.clone()).await;
            return Err(aborted());
        }
        let error = *self.wire.inner.write_error.lock().unwrap();
        if let Some(kind) = error {
            return Err(io::Error::new(kind, "scripted write failure"));
        }
        self.wire.inner.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}
