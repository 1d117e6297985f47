//! Transports the connection manager can open.

use std::io;

use async_trait::async_trait;
use tokio::{io::AsyncWrite, net::TcpStream};

/// Opens outbound streams for [`super::ConnectionManager`].
///
/// Each call to [`Connector::connect`] is a single attempt; retry cadence is
/// owned by the reconnect loop. Implementations must be cancellation-safe:
/// dropping a pending `connect()` future must not leak a half-open stream.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stream produced by a successful attempt.
    type Stream: AsyncWrite + Unpin + Send + 'static;

    /// Make one connection attempt.
    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Human-readable description of the remote endpoint for logs.
    fn peer(&self) -> String;
}

/// Connects to a TCP endpoint by host name and port.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    /// Create a connector for `host:port`. The host is resolved on every
    /// attempt.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    #[tracing::instrument(level = "debug", skip(self), fields(host = %self.host, port = self.port))]
    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn peer(&self) -> String { format!("{}:{}", self.host, self.port) }
}
