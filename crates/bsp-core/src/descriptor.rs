//! Stream and device descriptors
//!
//! [`StreamInfo`] is what discovery hands out, [`StreamDescription`] is the
//! full self-reported metadata of an opened stream and [`DeviceDescriptor`]
//! is the flattened view the negotiator works with.

use serde::{Deserialize, Serialize};

/// Identity of a discovered stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream name as published (e.g. "BioSemi", "PsychoPyMarkers")
    pub name: String,
    /// Content type used for discovery (e.g. "EEG", "Markers")
    pub content_type: String,
    /// Publisher-assigned source identifier, possibly empty
    pub source_id: String,
    /// Transport-assigned unique id of this stream instance
    pub uid: String,
}

impl StreamInfo {
    pub fn new(name: &str, content_type: &str, source_id: &str, uid: &str) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            source_id: source_id.to_string(),
            uid: uid.to_string(),
        }
    }
}

/// One entry of a stream's channel description tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescription {
    /// Channel label (e.g. "Fp1", "O1")
    pub label: String,
    /// Physical unit, if published
    #[serde(default)]
    pub unit: Option<String>,
}

impl ChannelDescription {
    pub fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            unit: None,
        }
    }
}

/// Self-reported metadata of an opened stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescription {
    /// Reported stream name
    pub name: String,
    /// Nominal sample rate in Hz, 0 for irregular streams
    pub nominal_srate: f64,
    /// Number of channels per sample
    pub channel_count: usize,
    /// Channel description tree; absent when the publisher sent none
    pub channels: Option<Vec<ChannelDescription>>,
}

/// Device metadata read once from the primary inlet
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub reported_name: String,
    pub nominal_sample_rate: f64,
    pub raw_channel_count: usize,
    /// Labels in channel order; empty when the device publishes none
    pub raw_channel_labels: Vec<String>,
}

impl DeviceDescriptor {
    /// Flatten a stream description.
    ///
    /// At most `channel_count` labels are read from the channel tree. A
    /// missing or empty tree yields an empty label list.
    pub fn from_description(description: &StreamDescription) -> Self {
        let raw_channel_labels = description
            .channels
            .as_ref()
            .map(|channels| {
                channels
                    .iter()
                    .take(description.channel_count)
                    .map(|channel| channel.label.clone())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            reported_name: description.name.clone(),
            nominal_sample_rate: description.nominal_srate,
            raw_channel_count: description.channel_count,
            raw_channel_labels,
        }
    }
}

/// Negotiated session metadata, frozen after resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Resolved device name
    pub name: String,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Resolved channel list: raw labels followed by appended fields
    pub channels: Vec<String>,
}
