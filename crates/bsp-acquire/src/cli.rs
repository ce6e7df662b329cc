use bsp_acquisition::AcquisitionConfig;
use bsp_simulation::SignalPattern;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bsp-acquire",
    version,
    about = "Merge a sample stream with a marker stream into one record per sample",
    long_about = "Runs a simulated amplifier and a marker source, binds both streams and \
                  prints every merged record as a JSON array on stdout. Logs go to stderr."
)]
pub struct Cli {
    /// JSON acquisition configuration; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Expected raw channel labels
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub channels: Option<Vec<String>>,

    /// Expected sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Append the transport timestamp before the trigger field
    #[arg(long)]
    pub include_timestamp: bool,

    /// Device name to report instead of the stream name
    #[arg(long)]
    pub stream_name: Option<String>,

    /// Number of records to read
    #[arg(long, default_value_t = 100)]
    pub count: usize,

    /// Channels of the simulated device
    #[arg(long, default_value_t = 4)]
    pub sim_channels: usize,

    /// Sampling rate of the simulated device in Hz
    #[arg(long, default_value_t = 256.0)]
    pub sim_rate: f64,

    /// Simulated device publishes no channel labels
    #[arg(long)]
    pub sim_unlabelled: bool,

    /// Signal preset of the simulated device (flat, alpha, beta, spindles, drift)
    #[arg(long, default_value = "alpha", value_parser = parse_pattern)]
    pub sim_pattern: SignalPattern,

    /// Milliseconds between simulated markers
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub marker_interval: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_pattern(name: &str) -> Result<SignalPattern, String> {
    SignalPattern::preset(name).ok_or_else(|| {
        let known: Vec<&str> = SignalPattern::presets()
            .into_iter()
            .map(|(preset, _)| preset)
            .collect();
        format!("unknown pattern '{}', expected one of {}", name, known.join(", "))
    })
}

impl Cli {
    /// Configuration file (or defaults) with command line overrides applied
    pub fn acquisition_config(&self) -> anyhow::Result<AcquisitionConfig> {
        let mut config = match &self.config {
            Some(path) => AcquisitionConfig::from_json_file(path)?,
            None => AcquisitionConfig::default(),
        };

        if let Some(channels) = &self.channels {
            config.channels = Some(channels.clone());
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = Some(rate);
        }
        if self.include_timestamp {
            config.include_timestamp = true;
        }
        if let Some(name) = &self.stream_name {
            config.connection.stream_name = Some(name.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
