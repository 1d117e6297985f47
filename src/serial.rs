//! Serial device access.
//!
//! The bridge reads through the [`ByteSource`] trait so the reader activity
//! can be driven by anything implementing [`std::io::Read`]: a real port
//! opened with [`open`], or an in-memory source in tests.

use std::io::{self, Read};

use log::info;
use serialport::{FlowControl, SerialPort};

use crate::{config::SerialSettings, error::BridgeError};

/// A polled, blocking byte source with bounded read latency.
pub trait ByteSource: Send + 'static {
    /// Read the next chunk into `buf`.
    ///
    /// Returns `Ok(0)` when no bytes arrived before the source's timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error for any other failure. The reader
    /// treats such errors as transient.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Read + Send + 'static> ByteSource for R {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read(buf) {
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            other => other,
        }
    }
}

/// Open the configured serial device without flow control.
///
/// # Errors
///
/// Returns [`BridgeError::DeviceOpen`] if the driver cannot open the device.
pub fn open(settings: &SerialSettings) -> Result<Box<dyn SerialPort>, BridgeError> {
    let port = serialport::new(&settings.path, settings.baud_rate)
        .data_bits(settings.driver_data_bits())
        .parity(settings.parity.into())
        .stop_bits(settings.driver_stop_bits())
        .flow_control(FlowControl::None)
        .timeout(settings.read_timeout())
        .open()
        .map_err(|source| BridgeError::DeviceOpen {
            path: settings.path.clone(),
            source,
        })?;
    info!(
        "serial port opened: path={}, baud_rate={}",
        settings.path, settings.baud_rate
    );
    Ok(port)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};

    use rstest::rstest;

    use super::ByteSource;
    use crate::config::SerialSettings;

    struct Failing(io::ErrorKind);

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> { Err(self.0.into()) }
    }

    #[rstest]
    #[case(io::ErrorKind::TimedOut)]
    #[case(io::ErrorKind::WouldBlock)]
    #[case(io::ErrorKind::Interrupted)]
    fn timeouts_read_as_empty(#[case] kind: io::ErrorKind) {
        let mut source = Failing(kind);
        let mut buf = [0u8; 8];
        assert_eq!(source.read_chunk(&mut buf).expect("empty read"), 0);
    }

    #[test]
    fn other_errors_are_reported() {
        let mut source = Failing(io::ErrorKind::BrokenPipe);
        let mut buf = [0u8; 8];
        let err = source.read_chunk(&mut buf).expect_err("should fail");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn readers_pass_bytes_through() {
        let mut source = io::Cursor::new(b"abc".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(source.read_chunk(&mut buf).expect("read"), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn missing_device_fails_to_open() {
        let settings = SerialSettings {
            path: "/dev/linebridge-does-not-exist".to_owned(),
            ..SerialSettings::default()
        };
        let err = super::open(&settings).expect_err("device should not exist");
        assert!(err.to_string().contains("/dev/linebridge-does-not-exist"));
    }
}
