//! Test doubles and fixtures for exercising `linebridge` without hardware.
//!
//! - [`CaptureServer`] accepts TCP connections and decodes the STX/ETX
//!   frames it receives.
//! - [`FakeConnector`] hands out in-memory streams whose connects, writes
//!   and closes are counted through a shared [`ConnectorProbe`].
//! - [`ScriptedSource`] plays back a fixed sequence of device reads.
//! - [`logger`] captures `log` output for assertions.

pub mod capture_server;
pub mod connector;
pub mod logging;
pub mod source;

pub use capture_server::CaptureServer;
pub use connector::{ConnectorProbe, FakeConnector, FakeStream};
pub use logging::{LoggerHandle, logger};
pub use source::{ReadStep, ScriptedSource};

/// Result type used by helper-driven tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
