//! TCP server that records the frames a bridge sends it.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use futures::StreamExt;
use linebridge::frame::SentinelDecoder;
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::codec::FramedRead;

/// Accepts any number of connections and decodes STX/ETX frames from each.
///
/// Frame bodies from every connection are delivered through
/// [`CaptureServer::next_frame`] in arrival order.
pub struct CaptureServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Bytes>,
    accepted: Arc<AtomicUsize>,
    kick: watch::Sender<u64>,
    task: JoinHandle<()>,
}

impl CaptureServer {
    /// Bind to an ephemeral localhost port and start accepting.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)).await?;
        let addr = listener.local_addr()?;
        let (tx, frames) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (kick, kick_rx) = watch::channel(0u64);

        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let tx = tx.clone();
                let mut kick_rx = kick_rx.clone();
                kick_rx.mark_unchanged();
                tokio::spawn(async move {
                    let mut framed = FramedRead::new(stream, SentinelDecoder::default());
                    loop {
                        tokio::select! {
                            item = framed.next() => match item {
                                Some(Ok(frame)) => {
                                    if tx.send(frame).is_err() {
                                        break;
                                    }
                                }
                                _ => break,
                            },
                            _ = kick_rx.changed() => break,
                        }
                    }
                });
            }
        });

        Ok(Self {
            addr,
            frames,
            accepted,
            kick,
            task,
        })
    }

    /// Address the server listens on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn accepted(&self) -> usize { self.accepted.load(Ordering::SeqCst) }

    /// Close every connection accepted so far. The listener stays open.
    pub fn drop_connections(&self) { self.kick.send_modify(|n| *n += 1); }

    /// Wait up to `within` for the next frame body.
    pub async fn next_frame(&mut self, within: Duration) -> Option<Bytes> {
        timeout(within, self.frames.recv()).await.ok().flatten()
    }
}

impl Drop for CaptureServer {
    fn drop(&mut self) { self.task.abort(); }
}
