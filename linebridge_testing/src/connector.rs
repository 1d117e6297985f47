//! In-memory connector double with observable counters.

use std::{
    io,
    pin::Pin,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use linebridge::{connection::Connector, frame::SentinelDecoder};
use tokio::io::AsyncWrite;
use tokio_util::codec::Decoder;

#[derive(Default)]
struct ProbeState {
    attempts: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    write_calls: AtomicUsize,
    fail_connects: AtomicBool,
    hang_connects: AtomicBool,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    written: Mutex<Vec<u8>>,
}

/// Shared view of everything a [`FakeConnector`] and its streams did.
#[derive(Clone, Default)]
pub struct ConnectorProbe {
    state: Arc<ProbeState>,
}

impl ConnectorProbe {
    /// Number of connect attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize { self.state.attempts.load(Ordering::SeqCst) }

    /// Number of streams handed out.
    #[must_use]
    pub fn opened(&self) -> usize { self.state.opened.load(Ordering::SeqCst) }

    /// Number of streams shut down.
    #[must_use]
    pub fn closed(&self) -> usize { self.state.closed.load(Ordering::SeqCst) }

    /// Number of `poll_write` calls across all streams.
    #[must_use]
    pub fn write_calls(&self) -> usize { self.state.write_calls.load(Ordering::SeqCst) }

    /// Make subsequent connect attempts fail with `ConnectionRefused`.
    pub fn fail_connects(&self, fail: bool) { self.state.fail_connects.store(fail, Ordering::SeqCst); }

    /// Make subsequent connect attempts never complete.
    pub fn hang_connects(&self, hang: bool) { self.state.hang_connects.store(hang, Ordering::SeqCst); }

    /// Make subsequent writes fail with `BrokenPipe`.
    pub fn fail_writes(&self, fail: bool) { self.state.fail_writes.store(fail, Ordering::SeqCst); }

    /// Make subsequent writes stay pending, like a peer that stopped reading.
    pub fn stall_writes(&self, stall: bool) { self.state.stall_writes.store(stall, Ordering::SeqCst); }

    /// Every byte successfully written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.state
            .written
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Frame bodies (between STX and ETX) successfully written so far.
    #[must_use]
    pub fn frames(&self) -> Vec<Bytes> {
        let mut decoder = SentinelDecoder::default();
        let mut buf = BytesMut::from(self.written().as_slice());
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = decoder.decode(&mut buf) {
            frames.push(frame);
        }
        frames
    }
}

/// Connector double whose streams record writes in memory.
#[derive(Clone, Default)]
pub struct FakeConnector {
    probe: ConnectorProbe,
}

impl FakeConnector {
    /// Create a connector and the probe observing it.
    #[must_use]
    pub fn new() -> (Self, ConnectorProbe) {
        let connector = Self::default();
        let probe = connector.probe.clone();
        (connector, probe)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Stream = FakeStream;

    async fn connect(&self) -> io::Result<FakeStream> {
        let state = &self.probe.state;
        state.attempts.fetch_add(1, Ordering::SeqCst);
        if state.hang_connects.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if state.fail_connects.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStream {
            probe: self.probe.clone(),
        })
    }

    fn peer(&self) -> String { "fake:0".to_owned() }
}

/// Stream produced by [`FakeConnector`].
pub struct FakeStream {
    probe: ConnectorProbe,
}

impl AsyncWrite for FakeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let state = &self.probe.state;
        state.write_calls.fetch_add(1, Ordering::SeqCst);
        if state.fail_writes.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        if state.stall_writes.load(Ordering::SeqCst) {
            return Poll::Pending;
        }
        state
            .written
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.probe.state.closed.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
