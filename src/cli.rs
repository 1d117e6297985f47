//! Command line interface for the `linebridge` binary.
//!
//! Every flag is optional and overrides the matching configuration file
//! value. The same definition drives man page generation in `build.rs`.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `linebridge` binary.
#[derive(Debug, Parser)]
#[command(
    name = "linebridge",
    version,
    about = "Forward serial device lines to a TCP server as STX/ETX frames"
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Serial device path.
    #[arg(short, long, value_name = "PATH")]
    pub device: Option<String>,
    /// Serial baud rate.
    #[arg(short, long)]
    pub baud: Option<u32>,
    /// Remote host name or address.
    #[arg(long)]
    pub host: Option<String>,
    /// Remote TCP port.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,
    /// Upper bound for a single connect attempt, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub connect_timeout_ms: Option<u64>,
    /// Upper bound for writing one frame, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub write_timeout_ms: Option<u64>,
    /// Text placed after STX in every frame.
    #[arg(long)]
    pub header: Option<String>,
    /// Text placed before ETX in every frame.
    #[arg(long)]
    pub footer: Option<String>,
    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_connection_flags() {
        let cli = Cli::parse_from([
            "linebridge",
            "--device",
            "/dev/ttyACM0",
            "--host",
            "10.1.1.1",
            "-p",
            "5000",
            "--header",
            "STM:2:1::1",
        ]);
        assert_eq!(cli.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cli.host.as_deref(), Some("10.1.1.1"));
        assert_eq!(cli.port, Some(5000));
        assert_eq!(cli.header.as_deref(), Some("STM:2:1::1"));
        assert!(cli.footer.is_none());
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(Cli::try_parse_from(["linebridge", "--port", "70000"]).is_err());
    }
}
