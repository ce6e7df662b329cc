//! BSP Acquire - sample/marker acquisition against a simulated lab network

mod cli;

use anyhow::Context;
use bsp_acquisition::{AcquisitionConfig, LslDevice};
use bsp_core::BspError;
use bsp_simulation::{
    spawn_marker_source, spawn_sample_source, MarkerSchedule, SimulatedNetwork, SimulatorConfig,
};
use clap::Parser;
use cli::Cli;
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.acquisition_config()?;
    let network = SimulatedNetwork::new();

    let sim_config = SimulatorConfig {
        publish_labels: !cli.sim_unlabelled,
        pattern: cli.sim_pattern,
        ..SimulatorConfig::with_channels(cli.sim_channels, cli.sim_rate)
    };
    info!(
        channels = cli.sim_channels,
        rate = cli.sim_rate,
        pattern = cli.sim_pattern.description(),
        "starting simulated device"
    );
    let samples = spawn_sample_source(
        &network,
        &config.connection.content_type,
        "bsp-sim",
        sim_config,
    )?;
    let markers = spawn_marker_source(
        &network,
        "SimulatedMarkers",
        &config.connection.marker_content_type,
        MarkerSchedule {
            interval: Duration::from_millis(cli.marker_interval),
            ..Default::default()
        },
    );

    let count = cli.count;
    let outcome = tokio::task::spawn_blocking(move || acquire(network, config, count)).await;

    markers.stop().await;
    samples.stop().await;

    let written = outcome.context("acquisition task panicked")??;
    info!(records = written, "acquisition finished");
    Ok(())
}

/// Connect, resolve and stream `count` records to stdout
fn acquire(
    network: SimulatedNetwork,
    config: AcquisitionConfig,
    count: usize,
) -> anyhow::Result<usize> {
    let mut device = LslDevice::new(network, config)?;
    device.connect()?;
    let device_info = device.resolve()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", serde_json::to_string(&device_info)?)?;

    let mut written = 0;
    while written < count {
        let record = match device.read() {
            Ok(record) => record,
            Err(err @ BspError::StreamClosed { .. }) => {
                warn!(error = %err, "stopping early");
                break;
            }
            Err(err) => return Err(err.into()),
        };
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
        written += 1;
    }

    out.flush()?;
    device.disconnect();
    Ok(written)
}
