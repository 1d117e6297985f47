//! Canonical error types for the bridge.
//!
//! Each activity handles its own failures locally; these types only cross
//! an operation boundary so the caller can decide what to log and which
//! state to publish.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors that end an activity or prevent the bridge from starting.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The serial device could not be opened. Fatal to the reader only.
    #[error("failed to open serial device {path}: {source}")]
    DeviceOpen {
        /// Device path as configured.
        path: String,
        /// Driver error.
        #[source]
        source: serialport::Error,
    },
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path passed on the command line.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid TOML for [`crate::config::BridgeConfig`].
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// A single connection attempt failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport refused or aborted the attempt.
    #[error("connect to {peer} failed: {source}")]
    Io {
        /// Remote endpoint description.
        peer: String,
        /// I/O error.
        #[source]
        source: io::Error,
    },
    /// The attempt did not complete within the configured timeout.
    #[error("connect to {peer} timed out after {timeout:?}")]
    Timeout {
        /// Remote endpoint description.
        peer: String,
        /// Configured connect timeout.
        timeout: Duration,
    },
}

/// A frame could not be handed to the remote endpoint.
#[derive(Debug, Error)]
pub enum SendError {
    /// No connection is currently established. Nothing was written.
    #[error("not connected")]
    NotConnected,
    /// Writing the frame failed; the connection has been torn down.
    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

impl SendError {
    /// Whether a write was attempted before the failure.
    #[must_use]
    pub fn write_attempted(&self) -> bool { matches!(self, Self::Io(_)) }
}
