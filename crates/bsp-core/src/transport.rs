//! Transport seam: stream discovery and inlets
//!
//! The acquisition core never talks to a network library directly. A
//! transport backend (LSL binding, simulation, replay) implements these
//! traits and the core drives them.

use crate::descriptor::{StreamDescription, StreamInfo};
use crate::error::BspResult;
use std::time::Duration;

/// Filter applied to discovered streams
pub type StreamPredicate<'a> = dyn Fn(&StreamInfo) -> bool + 'a;

/// Resolves published streams and opens read handles on them
pub trait StreamDiscovery {
    /// Inlet type for multi-channel sample streams
    type SampleInlet: SampleInlet;
    /// Inlet type for marker streams
    type MarkerInlet: MarkerInlet;

    /// Find streams of a content type accepted by `predicate`.
    ///
    /// Order is whatever the transport reports; an empty result is not an
    /// error at this level.
    fn resolve_streams(
        &self,
        content_type: &str,
        predicate: &StreamPredicate<'_>,
    ) -> BspResult<Vec<StreamInfo>>;

    /// Open a read handle on a sample stream
    fn open_sample_inlet(&self, info: &StreamInfo) -> BspResult<Self::SampleInlet>;

    /// Open a read handle on a marker stream
    fn open_marker_inlet(&self, info: &StreamInfo) -> BspResult<Self::MarkerInlet>;
}

/// Read handle on a multi-channel sample stream
pub trait SampleInlet {
    /// Self-reported metadata of the stream
    fn describe(&self) -> BspResult<StreamDescription>;

    /// Block until the next sample arrives.
    ///
    /// Returns the channel values and the sample timestamp. A terminated
    /// connection surfaces as `BspError::StreamClosed`.
    fn pull_sample(&mut self) -> BspResult<(Vec<f64>, f64)>;
}

/// Read handle on a marker stream
pub trait MarkerInlet {
    /// Self-reported metadata of the stream
    fn describe(&self) -> BspResult<StreamDescription>;

    /// Pull the next marker, waiting at most `timeout`.
    ///
    /// A zero timeout only returns a marker that is already buffered.
    fn pull_marker(&mut self, timeout: Duration) -> BspResult<Option<(Vec<String>, f64)>>;
}
