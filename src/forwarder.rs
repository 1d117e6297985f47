//! Best-effort hand-off of frames to the current connection.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    connection::{ConnectionManager, Connector},
    error::SendError,
    frame::Frame,
    metrics::{self, Outcome},
};

/// Sends frames through a shared [`ConnectionManager`].
///
/// A frame is written at most once. When no connection exists, or the write
/// fails, the frame is dropped; nothing is queued or retried.
pub struct Forwarder<C: Connector> {
    manager: Arc<ConnectionManager<C>>,
}

impl<C: Connector> Clone for Forwarder<C> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<C: Connector> Forwarder<C> {
    /// Create a forwarder sharing `manager` with the reconnect loop.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager<C>>) -> Self { Self { manager } }

    /// The manager this forwarder writes through.
    #[must_use]
    pub fn manager(&self) -> &Arc<ConnectionManager<C>> { &self.manager }

    /// Forward `frame`, returning whether it was delivered.
    ///
    /// A write failure tears the connection down so the reconnect loop can
    /// replace it; the failed frame is not resent.
    pub async fn send(&self, frame: &Frame) -> bool {
        let outcome = match self.manager.send(frame.as_bytes()).await {
            Ok(()) => {
                debug!("frame sent: len={}", frame.len());
                Outcome::Delivered
            }
            Err(SendError::NotConnected) => {
                info!("not connected; dropping frame: len={}", frame.len());
                Outcome::Dropped
            }
            Err(e @ SendError::Io(_)) => {
                warn!(
                    "send failed; connection closed and frame dropped: error={e}, len={}",
                    frame.len()
                );
                Outcome::Dropped
            }
        };
        metrics::inc_frames(outcome);
        outcome == Outcome::Delivered
    }
}
