//! Ownership of the single outbound connection.
//!
//! [`ConnectionManager`] keeps the current stream in one mutex-guarded slot.
//! Connecting, sending and closing each take the lock for exactly one
//! operation, so the reconnect loop and the forwarder never observe the
//! handle at the same time. The lock is never held across the retry delay.

mod connector;
mod state;

use std::{io, time::Duration};

pub use connector::{Connector, TcpConnector};
use log::{debug, info, warn};
pub use state::ConnectionState;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    select,
    sync::{Mutex, watch},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ConnectError, SendError},
    metrics,
};

/// Connect timeout applied when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-frame write timeout applied when none is configured.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

const MIN_DELAY: Duration = Duration::from_millis(1);

/// Owns the outbound connection and serialises every access to it.
///
/// # Examples
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use linebridge::connection::{ConnectionManager, TcpConnector};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let manager = Arc::new(ConnectionManager::new(TcpConnector::new("127.0.0.1", 1024)));
/// let token = CancellationToken::new();
///
/// let reconnect = {
///     let manager = Arc::clone(&manager);
///     let token = token.clone();
///     tokio::spawn(async move {
///         manager
///             .run_reconnect_loop(Duration::from_secs(3), token)
///             .await;
///     })
/// };
///
/// let _ = manager.send(b"\x02STM:1:1::1hello:\x03").await;
/// token.cancel();
/// reconnect.await.expect("reconnect loop panicked");
/// # }
/// ```
pub struct ConnectionManager<C: Connector> {
    connector: C,
    slot: Mutex<Option<C::Stream>>,
    state: watch::Sender<ConnectionState>,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a disconnected manager using [`DEFAULT_CONNECT_TIMEOUT`].
    #[must_use]
    pub fn new(connector: C) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            slot: Mutex::new(None),
            state,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Bound every connect attempt by `connect_timeout` (at least 1 ms).
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout.max(MIN_DELAY);
        self
    }

    /// Bound every frame write by `write_timeout` (at least 1 ms).
    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout.max(MIN_DELAY);
        self
    }

    /// The transport used to open connections.
    pub fn connector(&self) -> &C { &self.connector }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { *self.state.borrow() }

    /// Watch lifecycle transitions without taking the connection lock.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> { self.state.subscribe() }

    /// Replace the current connection with a freshly opened one.
    ///
    /// Any existing handle is closed exactly once before the single attempt
    /// is made. The attempt is bounded by the configured connect timeout and
    /// is never retried here.
    ///
    /// Dropping the returned future mid-attempt leaves the state at
    /// [`ConnectionState::Connecting`]; callers that cancel an attempt should
    /// follow up with [`ConnectionManager::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the attempt fails or times out. The state
    /// is then [`ConnectionState::Disconnected`].
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let mut slot = self.slot.lock().await;
        let peer = self.connector.peer();
        if let Some(previous) = slot.take() {
            debug!("closing previous connection: peer={peer}");
            close(previous).await;
            metrics::set_connected(false);
        }

        self.publish(ConnectionState::Connecting);
        info!("connecting: peer={peer}");
        let result = match timeout(self.connect_timeout, self.connector.connect()).await {
            Ok(Ok(stream)) => {
                *slot = Some(stream);
                self.publish(ConnectionState::Connected);
                info!("connected: peer={peer}");
                Ok(())
            }
            Ok(Err(source)) => {
                self.publish(ConnectionState::Disconnected);
                Err(ConnectError::Io { peer, source })
            }
            Err(_) => {
                self.publish(ConnectionState::Disconnected);
                Err(ConnectError::Timeout {
                    peer,
                    timeout: self.connect_timeout,
                })
            }
        };
        metrics::inc_connect_attempts(result.is_ok());
        metrics::set_connected(result.is_ok());
        result
    }

    /// Write every byte of `frame` to the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] without attempting a write when no
    /// connection exists. Returns [`SendError::Io`] when the write fails or
    /// does not finish within the write timeout (kind
    /// [`io::ErrorKind::TimedOut`]); the connection is then closed and
    /// discarded and the state becomes [`ConnectionState::Disconnected`].
    pub async fn send(&self, frame: &[u8]) -> Result<(), SendError> {
        let mut slot = self.slot.lock().await;
        let Some(stream) = slot.as_mut() else {
            return Err(SendError::NotConnected);
        };

        let written = timeout(self.write_timeout, write_frame(stream, frame))
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("write timed out after {:?}", self.write_timeout),
                ))
            });
        if let Err(e) = written {
            if let Some(broken) = slot.take() {
                close(broken).await;
            }
            self.publish(ConnectionState::Disconnected);
            metrics::set_connected(false);
            return Err(SendError::Io(e));
        }
        Ok(())
    }

    /// Close and discard the current connection, if any.
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(stream) = slot.take() {
            info!("closing connection: peer={}", self.connector.peer());
            close(stream).await;
        }
        self.publish(ConnectionState::Disconnected);
        metrics::set_connected(false);
    }

    /// Keep a connection established until `shutdown` is cancelled.
    ///
    /// Whenever the state is [`ConnectionState::Disconnected`] a single
    /// connect attempt is made; regardless of its outcome the loop then
    /// waits `retry_delay` before checking again. A healthy connection is
    /// never closed by the loop. Cancellation interrupts both the delay and
    /// an in-flight attempt.
    pub async fn run_reconnect_loop(&self, retry_delay: Duration, shutdown: CancellationToken) {
        let retry_delay = retry_delay.max(MIN_DELAY);
        loop {
            if self.state() == ConnectionState::Disconnected {
                select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    result = self.connect() => {
                        if let Err(e) = result {
                            warn!("connect attempt failed: error={e}, retry_in={retry_delay:?}");
                        }
                    }
                }
            }

            select! {
                biased;

                () = shutdown.cancelled() => break,
                () = sleep(retry_delay) => {}
            }
        }

        if self.state() == ConnectionState::Connecting {
            self.publish(ConnectionState::Disconnected);
        }
        debug!("reconnect loop stopped: peer={}", self.connector.peer());
    }

    fn publish(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("connection state changed: from={previous}, to={state}");
        }
    }
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}

async fn close<S: AsyncWrite + Unpin>(mut stream: S) {
    if let Err(e) = stream.shutdown().await {
        debug!("error while closing connection: error={e}");
    }
}
