//! Merged output record and marker types

use serde::Serialize;

/// Trigger value of a sample without an attached marker
pub const NO_TRIGGER: &str = "0";

/// A discrete timestamped event pulled from a marker stream
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub label: String,
    pub timestamp: f64,
}

impl Marker {
    pub fn new(label: &str, timestamp: f64) -> Self {
        Self {
            label: label.to_string(),
            timestamp,
        }
    }

    /// Build a marker from a raw marker sample; the label is the first value.
    pub fn from_values(values: Vec<String>, timestamp: f64) -> Self {
        let label = values.into_iter().next().unwrap_or_default();
        Self { label, timestamp }
    }

    /// Empty labels never attach to a sample
    pub fn has_label(&self) -> bool {
        !self.label.is_empty()
    }
}

/// One field of a merged record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Raw channel value as delivered by the device
    Channel(f64),
    /// Pass-through transport timestamp of the sample
    Timestamp(f64),
    /// Marker label or [`NO_TRIGGER`]
    Trigger(String),
}

/// One synchronized output record per primary sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Vec<FieldValue>,
}

impl Record {
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Trigger field; always the last entry of a merged record
    pub fn trigger(&self) -> Option<&str> {
        match self.fields.last() {
            Some(FieldValue::Trigger(label)) => Some(label),
            _ => None,
        }
    }

    /// Pass-through timestamp, when the record carries one
    pub fn timestamp(&self) -> Option<f64> {
        self.fields.iter().find_map(|field| match field {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        })
    }

    /// Raw channel values in channel order
    pub fn channel_values(&self) -> Vec<f64> {
        self.fields
            .iter()
            .filter_map(|field| match field {
                FieldValue::Channel(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}
