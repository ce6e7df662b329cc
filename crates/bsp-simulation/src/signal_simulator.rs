//! Multi-channel signal simulator for the simulated transport

use crate::signal_patterns::SignalPattern;
use bsp_core::{BspError, BspResult, ChannelDescription, StreamDescription};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Configuration for a simulated acquisition device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Name the device publishes
    pub device_name: String,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Channel labels; their count is the channel count
    pub channel_labels: Vec<String>,
    /// Publish the channel description tree (some amplifiers don't)
    pub publish_labels: bool,
    /// Deterministic signal component
    pub pattern: SignalPattern,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Power line interference (50/60Hz)
    pub powerline_freq: Option<f64>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation in microvolts (0.0 = no noise)
    pub gaussian_std: f64,
    /// Amplitude of slow baseline wander
    pub baseline_wander: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 2.0,
            baseline_wander: 5.0,
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_name: "SimulatedAmp".to_string(),
            sampling_rate: 256.0,
            channel_labels: ["Fz", "Cz", "Pz", "Oz"].iter().map(|s| s.to_string()).collect(),
            publish_labels: true,
            pattern: SignalPattern::default(),
            noise: NoiseConfig::default(),
            powerline_freq: Some(50.0),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Config with generic labels `ch1..chN`
    pub fn with_channels(channel_count: usize, sampling_rate: f64) -> Self {
        Self {
            sampling_rate,
            channel_labels: (1..=channel_count).map(|i| format!("ch{}", i)).collect(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> BspResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(BspError::configuration(format!(
                "simulated sampling rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        if self.channel_labels.is_empty() {
            return Err(BspError::configuration("simulated device needs at least one channel"));
        }
        Ok(())
    }

    /// Metadata the simulated device reports
    pub fn description(&self) -> StreamDescription {
        StreamDescription {
            name: self.device_name.clone(),
            nominal_srate: self.sampling_rate,
            channel_count: self.channel_labels.len(),
            channels: self.publish_labels.then(|| {
                self.channel_labels
                    .iter()
                    .map(|label| ChannelDescription {
                        label: label.clone(),
                        unit: Some("microvolts".to_string()),
                    })
                    .collect()
            }),
        }
    }
}

/// Signal simulator producing one multi-channel frame per call
pub struct SignalSimulator {
    config: SimulatorConfig,
    rng: rand::rngs::StdRng,
    normal_dist: Normal<f64>,
    sample_index: u64,
}

impl SignalSimulator {
    pub fn new(config: SimulatorConfig) -> BspResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std).map_err(|e| {
            BspError::configuration(format!("invalid noise configuration: {}", e))
        })?;

        Ok(SignalSimulator {
            config,
            rng,
            normal_dist,
            sample_index: 0,
        })
    }

    /// Generate the next frame, one value per channel
    pub fn next_frame(&mut self) -> Vec<f64> {
        let time = self.elapsed();
        let channel_count = self.config.channel_labels.len();
        let mut frame = Vec::with_capacity(channel_count);

        for channel_idx in 0..channel_count {
            // Small phase offset keeps channels from being identical
            let phase = channel_idx as f64 * 0.3;
            let mut value = self.config.pattern.value_at(time, phase);

            value += self.normal_dist.sample(&mut self.rng);
            value += self.config.noise.baseline_wander
                * (2.0 * std::f64::consts::PI * 0.1 * time).sin();
            if let Some(freq) = self.config.powerline_freq {
                value += 1.0 * (2.0 * std::f64::consts::PI * freq * time).sin();
            }
            // Occasional electrode pop
            if self.rng.gen::<f64>() < 1e-4 {
                value += self.rng.gen_range(-100.0..100.0);
            }

            frame.push(value);
        }

        self.sample_index += 1;
        frame
    }

    /// Seconds of signal generated so far
    pub fn elapsed(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
