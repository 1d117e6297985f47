//! Static bridge configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags. Every field has a default, so an empty file (or no
//! file at all) yields a working configuration.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    connection::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_WRITE_TIMEOUT},
    error::BridgeError,
    frame::{DEFAULT_FOOTER, DEFAULT_HEADER},
    line::DEFAULT_MAX_LINE_LENGTH,
};

/// Complete bridge configuration.
///
/// ```
/// use linebridge::config::BridgeConfig;
///
/// let config = BridgeConfig::from_toml_str(
///     r#"
///     [remote]
///     host = "10.0.0.7"
///     port = 4000
///     "#,
/// )
/// .expect("valid config");
/// assert_eq!(config.remote.port, 4000);
/// assert_eq!(config.serial.baud_rate, 115_200);
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Serial device settings.
    pub serial: SerialSettings,
    /// Remote endpoint settings.
    pub remote: RemoteSettings,
    /// Frame header and footer.
    pub framing: FramingSettings,
}

/// Parity setting for the serial line.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Serial device settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Data bits per character (5 to 8).
    pub data_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits (1 or 2).
    pub stop_bits: u8,
    /// Maximum time a single read blocks, in milliseconds.
    pub read_timeout_ms: u64,
    /// Idle time after a poll that returned no bytes, in milliseconds.
    pub poll_interval_ms: u64,
    /// Longest unterminated line kept before it is discarded.
    pub max_line_length: usize,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_owned(),
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            read_timeout_ms: 100,
            poll_interval_ms: 50,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl SerialSettings {
    /// Read timeout passed to the driver (at least 1 ms).
    #[must_use]
    pub fn read_timeout(&self) -> Duration { millis(self.read_timeout_ms) }

    /// Idle interval between empty polls (at least 1 ms).
    #[must_use]
    pub fn poll_interval(&self) -> Duration { millis(self.poll_interval_ms) }

    /// Data bits in the driver's representation; unknown values fall back
    /// to eight.
    #[must_use]
    pub fn driver_data_bits(&self) -> serialport::DataBits {
        match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    /// Stop bits in the driver's representation; unknown values fall back
    /// to one.
    #[must_use]
    pub fn driver_stop_bits(&self) -> serialport::StopBits {
        match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        }
    }
}

/// Remote endpoint settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Delay between reconnect checks, in milliseconds.
    pub retry_delay_ms: u64,
    /// Upper bound for a single connect attempt, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Upper bound for writing one frame, in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: "192.168.50.2".to_owned(),
            port: 1024,
            retry_delay_ms: 3_000,
            connect_timeout_ms: as_millis(DEFAULT_CONNECT_TIMEOUT),
            write_timeout_ms: as_millis(DEFAULT_WRITE_TIMEOUT),
        }
    }
}

impl RemoteSettings {
    /// Delay between reconnect checks (at least 1 ms).
    #[must_use]
    pub fn retry_delay(&self) -> Duration { millis(self.retry_delay_ms) }

    /// Connect timeout (at least 1 ms).
    #[must_use]
    pub fn connect_timeout(&self) -> Duration { millis(self.connect_timeout_ms) }

    /// Write timeout for one frame (at least 1 ms).
    #[must_use]
    pub fn write_timeout(&self) -> Duration { millis(self.write_timeout_ms) }
}

/// Fixed strings surrounding every payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FramingSettings {
    /// Text placed after STX.
    pub header: String,
    /// Text placed before ETX.
    pub footer: String,
}

impl Default for FramingSettings {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_owned(),
            footer: DEFAULT_FOOTER.to_owned(),
        }
    }
}

/// Command-line values that replace file settings when present.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Serial device path.
    pub device: Option<String>,
    /// Baud rate.
    pub baud_rate: Option<u32>,
    /// Remote host.
    pub host: Option<String>,
    /// Remote port.
    pub port: Option<u16>,
    /// Reconnect delay in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Frame write timeout in milliseconds.
    pub write_timeout_ms: Option<u64>,
    /// Frame header.
    pub header: Option<String>,
    /// Frame footer.
    pub footer: Option<String>,
}

impl BridgeConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigParse`] for malformed TOML or unknown
    /// keys.
    pub fn from_toml_str(text: &str) -> Result<Self, BridgeError> { Ok(toml::from_str(text)?) }

    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigRead`] if the file cannot be read and
    /// [`BridgeError::ConfigParse`] if it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let text = fs::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply command-line overrides on top of this configuration.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        let Overrides {
            device,
            baud_rate,
            host,
            port,
            retry_delay_ms,
            connect_timeout_ms,
            write_timeout_ms,
            header,
            footer,
        } = overrides;
        if let Some(v) = device {
            self.serial.path = v;
        }
        if let Some(v) = baud_rate {
            self.serial.baud_rate = v;
        }
        if let Some(v) = host {
            self.remote.host = v;
        }
        if let Some(v) = port {
            self.remote.port = v;
        }
        if let Some(v) = retry_delay_ms {
            self.remote.retry_delay_ms = v;
        }
        if let Some(v) = connect_timeout_ms {
            self.remote.connect_timeout_ms = v;
        }
        if let Some(v) = write_timeout_ms {
            self.remote.write_timeout_ms = v;
        }
        if let Some(v) = header {
            self.framing.header = v;
        }
        if let Some(v) = footer {
            self.framing.footer = v;
        }
        self
    }
}

fn millis(ms: u64) -> Duration { Duration::from_millis(ms.max(1)) }

fn as_millis(duration: Duration) -> u64 { u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) }

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{BridgeConfig, Overrides, Parity};
    use crate::error::BridgeError;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.path, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.serial.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.remote.host, "192.168.50.2");
        assert_eq!(config.remote.port, 1024);
        assert_eq!(config.remote.retry_delay(), Duration::from_secs(3));
        assert_eq!(config.remote.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.remote.write_timeout(), Duration::from_secs(5));
        assert_eq!(config.framing.header, "STM:1:1::1");
        assert_eq!(config.framing.footer, ":");
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").expect("parse");
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn sections_are_parsed() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [serial]
            path = "/dev/ttyACM1"
            baud_rate = 9600
            data_bits = 7
            parity = "even"
            stop_bits = 2

            [remote]
            retry_delay_ms = 250
            write_timeout_ms = 750

            [framing]
            header = "DEV:2:1::1"
            footer = ";"
            "#,
        )
        .expect("parse");

        assert_eq!(config.serial.path, "/dev/ttyACM1");
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.serial.driver_data_bits(), serialport::DataBits::Seven);
        assert_eq!(config.serial.driver_stop_bits(), serialport::StopBits::Two);
        assert_eq!(config.remote.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.remote.write_timeout(), Duration::from_millis(750));
        assert_eq!(config.remote.port, 1024);
        assert_eq!(config.framing.header, "DEV:2:1::1");
        assert_eq!(config.framing.footer, ";");
    }

    #[rstest]
    #[case("[serial]\nspeed = 9600\n")]
    #[case("[remote]\nport = \"http\"\n")]
    #[case("[serial]\nparity = \"mark\"\n")]
    fn invalid_documents_are_rejected(#[case] text: &str) {
        let err = BridgeConfig::from_toml_str(text).expect_err("should fail");
        assert!(matches!(err, BridgeError::ConfigParse(_)));
    }

    #[test]
    fn zero_durations_are_clamped() {
        let config = BridgeConfig::from_toml_str("[remote]\nretry_delay_ms = 0\n").expect("parse");
        assert_eq!(config.remote.retry_delay(), Duration::from_millis(1));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let config = BridgeConfig::default().with_overrides(Overrides {
            device: Some("/dev/ttyS3".to_owned()),
            port: Some(9000),
            footer: Some("#".to_owned()),
            ..Overrides::default()
        });
        assert_eq!(config.serial.path, "/dev/ttyS3");
        assert_eq!(config.remote.port, 9000);
        assert_eq!(config.remote.host, "192.168.50.2");
        assert_eq!(config.framing.footer, "#");
        assert_eq!(config.framing.header, "STM:1:1::1");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BridgeConfig::load(std::path::Path::new("/nonexistent/linebridge.toml"))
            .expect_err("should fail");
        assert!(err.to_string().contains("/nonexistent/linebridge.toml"));
    }
}
