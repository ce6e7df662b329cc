//! Sample/marker merge loop
//!
//! Each call pulls one sample (blocking), polls the marker stream without
//! waiting when no marker is pending, and attaches the pending marker to the
//! first sample whose timestamp has caught up with it.

use crate::channels::AppendedChannels;
use crate::config::EmptyMarkerPolicy;
use bsp_core::{
    BspError, BspResult, FieldValue, Marker, MarkerInlet, Record, SampleInlet, NO_TRIGGER,
};
use std::time::Duration;
use tracing::{debug, warn};

/// The one marker held between reads
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MarkerSlot {
    #[default]
    Empty,
    Pending(Marker),
}

impl MarkerSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, MarkerSlot::Pending(_))
    }
}

/// Merges the sample stream with the marker stream
#[derive(Debug, Clone)]
pub struct SampleMarkerMerger {
    raw_channel_count: usize,
    appended: AppendedChannels,
    empty_marker_policy: EmptyMarkerPolicy,
    slot: MarkerSlot,
    marker_stream_open: bool,
}

impl SampleMarkerMerger {
    pub fn new(
        raw_channel_count: usize,
        appended: AppendedChannels,
        empty_marker_policy: EmptyMarkerPolicy,
    ) -> Self {
        Self {
            raw_channel_count,
            appended,
            empty_marker_policy,
            slot: MarkerSlot::Empty,
            marker_stream_open: true,
        }
    }

    /// Length of every emitted record
    pub fn record_len(&self) -> usize {
        self.raw_channel_count + self.appended.len()
    }

    pub fn pending(&self) -> &MarkerSlot {
        &self.slot
    }

    /// False once the marker stream has failed; records then carry no trigger
    pub fn marker_stream_open(&self) -> bool {
        self.marker_stream_open
    }

    /// Pull the next sample and emit its merged record.
    ///
    /// Blocks inside the sample pull only. A closed sample stream surfaces as
    /// `BspError::StreamClosed` and is not retried.
    pub fn read<S, M>(&mut self, samples: &mut S, markers: &mut M) -> BspResult<Record>
    where
        S: SampleInlet,
        M: MarkerInlet,
    {
        let (values, timestamp) = match samples.pull_sample() {
            Ok(sample) => sample,
            Err(err @ BspError::StreamClosed { .. }) => {
                warn!(error = %err, "sample stream closed");
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        self.merge_sample(values, timestamp, markers)
    }

    /// Merge an already pulled sample with the marker stream
    pub fn merge_sample<M: MarkerInlet>(
        &mut self,
        values: Vec<f64>,
        timestamp: f64,
        markers: &mut M,
    ) -> BspResult<Record> {
        // Reject before touching the marker slot so no marker is consumed
        if values.len() != self.raw_channel_count {
            return Err(BspError::ChannelCount {
                expected: self.raw_channel_count,
                actual: values.len(),
            });
        }

        if self.marker_stream_open && !self.slot.is_pending() {
            self.poll_marker(markers, timestamp);
        }
        let trigger = self.resolve_trigger(timestamp);

        let mut fields: Vec<FieldValue> = Vec::with_capacity(self.record_len());
        fields.extend(values.into_iter().map(FieldValue::Channel));
        if self.appended.includes_timestamp() {
            fields.push(FieldValue::Timestamp(timestamp));
        }
        fields.push(FieldValue::Trigger(trigger));

        Ok(Record::new(fields))
    }

    /// Non-blocking marker poll; a failed marker inlet is not polled again
    fn poll_marker<M: MarkerInlet>(&mut self, markers: &mut M, sample_timestamp: f64) {
        let (values, marker_timestamp) = match markers.pull_marker(Duration::ZERO) {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "marker stream lost; records carry no trigger from now on");
                self.marker_stream_open = false;
                return;
            }
        };
        let marker = Marker::from_values(values, marker_timestamp);
        debug!(
            label = %marker.label,
            marker_timestamp,
            sample_timestamp,
            "read marker"
        );

        if !marker.has_label() {
            match self.empty_marker_policy {
                EmptyMarkerPolicy::Discard => {
                    debug!(marker_timestamp, "discarded marker with empty label");
                    return;
                }
                EmptyMarkerPolicy::Retain => {
                    warn!(
                        marker_timestamp,
                        "marker with empty label is pending; it will never attach and blocks later markers"
                    );
                }
            }
        }

        self.slot = MarkerSlot::Pending(marker);
    }

    /// Trigger value for a sample at `sample_timestamp`.
    ///
    /// A pending marker is attached, and the slot cleared, once the sample
    /// has caught up with it (`>=`) and its label is non-empty.
    pub fn resolve_trigger(&mut self, sample_timestamp: f64) -> String {
        let attach = match &self.slot {
            MarkerSlot::Pending(marker) => {
                sample_timestamp >= marker.timestamp && marker.has_label()
            }
            MarkerSlot::Empty => false,
        };
        if !attach {
            return NO_TRIGGER.to_string();
        }

        match std::mem::take(&mut self.slot) {
            MarkerSlot::Pending(marker) => {
                debug!(
                    label = %marker.label,
                    marker_timestamp = marker.timestamp,
                    sample_timestamp,
                    time_diff = sample_timestamp - marker.timestamp,
                    "attached marker"
                );
                marker.label
            }
            MarkerSlot::Empty => NO_TRIGGER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_core::StreamDiscovery;
    use bsp_simulation::{MarkerOutlet, SimulatedMarkerInlet, SimulatedNetwork};

    fn marker_stream() -> (MarkerOutlet, SimulatedMarkerInlet) {
        let network = SimulatedNetwork::new();
        let outlet = network.publish_markers("Stim", "Markers");
        let inlet = network.open_marker_inlet(outlet.info()).unwrap();
        (outlet, inlet)
    }

    fn merger(include_timestamp: bool) -> SampleMarkerMerger {
        SampleMarkerMerger::new(
            2,
            AppendedChannels::new(include_timestamp),
            EmptyMarkerPolicy::Retain,
        )
    }

    #[test]
    fn test_no_markers_means_zero_trigger() {
        let (_outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);
        for i in 0..5 {
            let record = merger.merge_sample(vec![1.0, 2.0], i as f64, &mut inlet).unwrap();
            assert_eq!(record.len(), 3);
            assert_eq!(record.trigger(), Some(NO_TRIGGER));
        }
    }

    #[test]
    fn test_marker_waits_for_sample_to_catch_up() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_marker("X", 1.5);
        let early = merger.merge_sample(vec![0.0, 0.0], 1.0, &mut inlet).unwrap();
        assert_eq!(early.trigger(), Some(NO_TRIGGER));
        assert!(merger.pending().is_pending());

        let late = merger.merge_sample(vec![0.0, 0.0], 2.0, &mut inlet).unwrap();
        assert_eq!(late.trigger(), Some("X"));
        assert_eq!(merger.pending(), &MarkerSlot::Empty);
    }

    #[test]
    fn test_coincident_marker_attaches_to_same_sample() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_marker("tie", 3.0);
        let record = merger.merge_sample(vec![0.0, 0.0], 3.0, &mut inlet).unwrap();
        assert_eq!(record.trigger(), Some("tie"));
    }

    #[test]
    fn test_backlog_is_not_polled_while_marker_pending() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_marker("first", 5.0);
        outlet.push_marker("second", 5.0);

        let triggers: Vec<String> = [1.0, 6.0, 7.0, 8.0]
            .iter()
            .map(|&ts| {
                merger
                    .merge_sample(vec![0.0, 0.0], ts, &mut inlet)
                    .unwrap()
                    .trigger()
                    .unwrap()
                    .to_string()
            })
            .collect();

        // "second" is only polled once "first" is attached at t=6.0
        assert_eq!(triggers, vec!["0", "first", "second", "0"]);
    }

    #[test]
    fn test_timestamp_field_precedes_trigger() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(true);

        outlet.push_marker("go", 0.5);
        let record = merger.merge_sample(vec![4.0, 5.0], 0.75, &mut inlet).unwrap();
        let fields = record.fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[2], FieldValue::Timestamp(0.75));
        assert_eq!(fields[3], FieldValue::Trigger("go".to_string()));
    }

    #[test]
    fn test_empty_label_is_retained_by_default() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_values(Vec::new(), 1.0);
        outlet.push_marker("later", 1.0);

        for ts in [2.0, 3.0, 4.0] {
            let record = merger.merge_sample(vec![0.0, 0.0], ts, &mut inlet).unwrap();
            assert_eq!(record.trigger(), Some(NO_TRIGGER));
        }
        assert!(merger.pending().is_pending());
    }

    #[test]
    fn test_empty_label_discarded_when_configured() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger =
            SampleMarkerMerger::new(2, AppendedChannels::new(false), EmptyMarkerPolicy::Discard);

        outlet.push_marker("", 1.0);
        outlet.push_marker("later", 1.0);

        let first = merger.merge_sample(vec![0.0, 0.0], 2.0, &mut inlet).unwrap();
        assert_eq!(first.trigger(), Some(NO_TRIGGER));
        let second = merger.merge_sample(vec![0.0, 0.0], 3.0, &mut inlet).unwrap();
        assert_eq!(second.trigger(), Some("later"));
    }

    #[test]
    fn test_wrong_sample_width_keeps_pending_marker() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_marker("kept", 0.0);
        let result = merger.merge_sample(vec![0.0], 1.0, &mut inlet);
        assert!(matches!(result, Err(BspError::ChannelCount { expected: 2, actual: 1 })));

        let record = merger.merge_sample(vec![0.0, 0.0], 1.0, &mut inlet).unwrap();
        assert_eq!(record.trigger(), Some("kept"));
    }

    #[test]
    fn test_closed_marker_stream_keeps_emitting_records() {
        let (outlet, mut inlet) = marker_stream();
        let mut merger = merger(false);

        outlet.push_marker("late", 5.0);
        let first = merger.merge_sample(vec![0.0, 0.0], 1.0, &mut inlet).unwrap();
        assert_eq!(first.trigger(), Some(NO_TRIGGER));
        drop(outlet);

        // The marker already held still attaches once the samples catch up
        let held = merger.merge_sample(vec![0.0, 0.0], 5.0, &mut inlet).unwrap();
        assert_eq!(held.trigger(), Some("late"));

        for ts in [6.0, 7.0] {
            let record = merger.merge_sample(vec![1.0, 2.0], ts, &mut inlet).unwrap();
            assert_eq!(record.trigger(), Some(NO_TRIGGER));
            assert_eq!(record.channel_values(), vec![1.0, 2.0]);
        }
        assert!(!merger.marker_stream_open());
    }
}
