//! Externally observable connection lifecycle.

use std::fmt;

/// Lifecycle of the single outbound connection.
///
/// `Disconnected → Connecting → Connected`, and back to `Disconnected` when
/// an attempt or a write fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection exists.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A connection is established and owned by the manager.
    Connected,
}

impl ConnectionState {
    /// Whether a connection is established.
    #[must_use]
    pub fn is_connected(self) -> bool { matches!(self, Self::Connected) }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}
