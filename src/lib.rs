#![doc(html_root_url = "https://docs.rs/linebridge/latest")]
//! Public API for the `linebridge` library.
//!
//! This crate forwards carriage-return terminated lines from a serial device
//! to a remote TCP endpoint. Each line is cleaned, escaped and wrapped in an
//! `STX‖HEADER‖payload‖FOOTER‖ETX` frame, then sent best-effort over a single
//! connection that a background loop keeps re-establishing.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod forwarder;
pub mod frame;
pub mod line;
pub mod metrics;
pub mod payload;
pub mod reader;
pub mod serial;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use connection::{ConnectionManager, ConnectionState, Connector, TcpConnector};
pub use error::{BridgeError, ConnectError, SendError};
pub use forwarder::Forwarder;
pub use frame::{ETX, Frame, MessageFramer, STX, SentinelDecoder};
pub use line::LineAssembler;
pub use payload::{Payload, PayloadTransformer};
pub use reader::{LinePipeline, ReaderOptions, run_reader};
pub use serial::ByteSource;
