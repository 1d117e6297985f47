//! Serial-to-TCP line bridge.
//!
//! Loads the configuration, installs logging (and optionally the Prometheus
//! exporter), then runs the bridge until Ctrl+C.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use linebridge::{
    Bridge,
    BridgeConfig,
    config::{Overrides, SerialSettings},
    serial,
};
use log::{error, info};

fn load_config(cli: &Cli) -> Result<BridgeConfig, linebridge::BridgeError> {
    let base = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    Ok(base.with_overrides(Overrides {
        device: cli.device.clone(),
        baud_rate: cli.baud,
        host: cli.host.clone(),
        port: cli.port,
        retry_delay_ms: cli.retry_delay_ms,
        connect_timeout_ms: cli.connect_timeout_ms,
        write_timeout_ms: cli.write_timeout_ms,
        header: cli.header.clone(),
        footer: cli.footer.clone(),
    }))
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &Cli) {
    if let Some(addr) = cli.metrics_addr {
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!("metrics exporter listening: addr={addr}"),
            Err(e) => error!("failed to install metrics exporter: addr={addr}, error={e}"),
        }
    }
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(cli: &Cli) {
    if cli.metrics_addr.is_some() {
        log::warn!("--metrics-addr ignored: built without the metrics feature");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    install_metrics(&cli);

    info!(
        "starting serial-to-TCP bridge: device={}, remote={}:{}",
        config.serial.path, config.remote.host, config.remote.port
    );
    let settings: SerialSettings = config.serial.clone();
    Bridge::from_config(&config)
        .run(move || serial::open(&settings))
        .await;
    info!("exited cleanly");
    ExitCode::SUCCESS
}
