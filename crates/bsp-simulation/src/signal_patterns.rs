//! Pre-defined signal patterns for simulated acquisition devices

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Deterministic part of a simulated channel, in microvolts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPattern {
    /// Constant offset
    Flat { level: f64 },
    /// Single oscillatory rhythm (e.g. 10 Hz alpha)
    Rhythm { frequency: f64, amplitude: f64 },
    /// Rhythm gated on/off in cycles
    Burst {
        frequency: f64,
        amplitude: f64,
        on_duration: f64,
        off_duration: f64,
    },
    /// Linear drift between two levels
    Ramp {
        start_level: f64,
        end_level: f64,
        duration: f64,
    },
}

impl SignalPattern {
    /// Pattern value at `time` seconds; `phase` shifts rhythms per channel
    pub fn value_at(&self, time: f64, phase: f64) -> f64 {
        match self {
            SignalPattern::Flat { level } => *level,

            SignalPattern::Rhythm { frequency, amplitude } => {
                amplitude * (2.0 * PI * frequency * time + phase).sin()
            }

            SignalPattern::Burst {
                frequency,
                amplitude,
                on_duration,
                off_duration,
            } => {
                let cycle = on_duration + off_duration;
                if cycle <= 0.0 || time % cycle < *on_duration {
                    amplitude * (2.0 * PI * frequency * time + phase).sin()
                } else {
                    0.0
                }
            }

            SignalPattern::Ramp {
                start_level,
                end_level,
                duration,
            } => {
                if time >= *duration {
                    *end_level
                } else {
                    start_level + (end_level - start_level) * (time / duration)
                }
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SignalPattern::Flat { .. } => "Flat line",
            SignalPattern::Rhythm { .. } => "Continuous rhythm",
            SignalPattern::Burst { .. } => "Gated rhythm bursts",
            SignalPattern::Ramp { .. } => "Linear drift",
        }
    }

    /// Look up a named preset
    pub fn preset(name: &str) -> Option<SignalPattern> {
        Self::presets()
            .into_iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, pattern)| pattern)
    }

    pub fn presets() -> Vec<(&'static str, SignalPattern)> {
        vec![
            ("flat", SignalPattern::Flat { level: 0.0 }),
            (
                "alpha",
                SignalPattern::Rhythm {
                    frequency: 10.0,
                    amplitude: 20.0,
                },
            ),
            (
                "beta",
                SignalPattern::Rhythm {
                    frequency: 20.0,
                    amplitude: 8.0,
                },
            ),
            (
                "spindles",
                SignalPattern::Burst {
                    frequency: 13.0,
                    amplitude: 30.0,
                    on_duration: 1.0,
                    off_duration: 4.0,
                },
            ),
            (
                "drift",
                SignalPattern::Ramp {
                    start_level: 0.0,
                    end_level: 50.0,
                    duration: 60.0,
                },
            ),
        ]
    }
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::Rhythm {
            frequency: 10.0,
            amplitude: 20.0,
        }
    }
}
