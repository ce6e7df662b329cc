//! Configuration management for the acquisition client

use bsp_core::{BspError, BspResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default content type of the primary sample stream
pub const DEFAULT_CONTENT_TYPE: &str = "EEG";

/// Default content type of the marker stream
pub const DEFAULT_MARKER_CONTENT_TYPE: &str = "Markers";

/// Construction-time configuration of an acquisition session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Connection parameters
    pub connection: ConnectionParams,
    /// Expected sample rate in Hz; adopted from the device when unset
    pub sample_rate: Option<f64>,
    /// Expected raw channel labels; adopted from the device when unset
    pub channels: Option<Vec<String>>,
    /// Append the transport timestamp of each sample before the trigger
    pub include_timestamp: bool,
    /// What to do with markers whose label is empty
    pub empty_marker_policy: EmptyMarkerPolicy,
}

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Explicit device name; wins over the name the device reports
    pub stream_name: Option<String>,
    /// Content type queried for the sample stream
    pub content_type: String,
    /// Content type queried for the marker stream
    pub marker_content_type: String,
    /// Only bind a sample stream published with this source id
    pub source_id: Option<String>,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            stream_name: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            marker_content_type: DEFAULT_MARKER_CONTENT_TYPE.to_string(),
            source_id: None,
        }
    }
}

/// Handling of markers with an empty label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyMarkerPolicy {
    /// Hold the marker like any other. It never attaches, so it occupies the
    /// pending slot for the rest of the session.
    #[default]
    Retain,
    /// Drop the marker when it is polled
    Discard,
}

impl AcquisitionConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> BspResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(text: &str) -> BspResult<Self> {
        let config: AcquisitionConfig = serde_json::from_str(text)
            .map_err(|e| BspError::configuration(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BspResult<()> {
        if self.connection.content_type.trim().is_empty() {
            return Err(BspError::configuration("content_type must not be empty"));
        }
        if self.connection.marker_content_type.trim().is_empty() {
            return Err(BspError::configuration("marker_content_type must not be empty"));
        }
        if let Some(rate) = self.sample_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(BspError::configuration(format!(
                    "sample_rate must be a non-negative number, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }

    /// Caller channel list; an empty list counts as none
    pub fn configured_channels(&self) -> Option<&[String]> {
        self.channels.as_deref().filter(|channels| !channels.is_empty())
    }

    pub fn with_channels(mut self, channels: &[&str]) -> Self {
        self.channels = Some(channels.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    pub fn with_stream_name(mut self, name: &str) -> Self {
        self.connection.stream_name = Some(name.to_string());
        self
    }
}
