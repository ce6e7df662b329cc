//! Binds the sample inlet and the marker inlet

use crate::config::ConnectionParams;
use bsp_core::{BspError, BspResult, MarkerInlet, SampleInlet, StreamDiscovery, StreamInfo};
use tracing::{debug, info};

/// Device name used when neither the caller nor the device provides one
pub const FALLBACK_DEVICE_NAME: &str = "LSL";

/// Device name precedence: caller-configured, then device-reported, then
/// [`FALLBACK_DEVICE_NAME`]. Empty names are skipped.
pub fn resolve_device_name(configured: Option<&str>, reported: Option<&str>) -> String {
    configured
        .filter(|name| !name.is_empty())
        .or(reported.filter(|name| !name.is_empty()))
        .unwrap_or(FALLBACK_DEVICE_NAME)
        .to_string()
}

/// Both open read handles; dropping the connection releases them
pub struct Connection<S: SampleInlet, M: MarkerInlet> {
    pub(crate) sample_inlet: S,
    pub(crate) marker_inlet: M,
    sample_stream: StreamInfo,
    marker_stream: StreamInfo,
    device_name: String,
}

impl<S: SampleInlet, M: MarkerInlet> Connection<S, M> {
    /// Name resolved once at connect time
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_stream(&self) -> &StreamInfo {
        &self.sample_stream
    }

    pub fn marker_stream(&self) -> &StreamInfo {
        &self.marker_stream
    }

    pub fn sample_inlet(&self) -> &S {
        &self.sample_inlet
    }

    pub fn marker_inlet(&self) -> &M {
        &self.marker_inlet
    }
}

/// Discovers and binds the two streams of a session
#[derive(Debug, Clone)]
pub struct DeviceConnector {
    params: ConnectionParams,
}

impl DeviceConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    /// Bind the first sample stream and the first marker stream found.
    ///
    /// Fails with `BspError::Connection` when either query comes back empty.
    pub fn connect<D: StreamDiscovery>(
        &self,
        discovery: &D,
    ) -> BspResult<Connection<D::SampleInlet, D::MarkerInlet>> {
        let source_id = self.params.source_id.as_deref();
        let accepts_source =
            |info: &StreamInfo| source_id.map_or(true, |id| info.source_id == id);
        let sample_streams =
            discovery.resolve_streams(&self.params.content_type, &accepts_source)?;
        let marker_streams =
            discovery.resolve_streams(&self.params.marker_content_type, &|_| true)?;

        debug!(
            sample_candidates = sample_streams.len(),
            marker_candidates = marker_streams.len(),
            "stream discovery finished"
        );

        let sample_stream = sample_streams
            .into_iter()
            .next()
            .ok_or_else(|| BspError::Connection {
                content_type: self.params.content_type.clone(),
            })?;
        let marker_stream = marker_streams
            .into_iter()
            .next()
            .ok_or_else(|| BspError::Connection {
                content_type: self.params.marker_content_type.clone(),
            })?;

        let sample_inlet = discovery.open_sample_inlet(&sample_stream)?;
        let marker_inlet = discovery.open_marker_inlet(&marker_stream)?;

        let device_name = resolve_device_name(
            self.params.stream_name.as_deref(),
            Some(sample_stream.name.as_str()),
        );

        info!(
            device = %device_name,
            samples = %sample_stream.name,
            markers = %marker_stream.name,
            "connected"
        );

        Ok(Connection {
            sample_inlet,
            marker_inlet,
            sample_stream,
            marker_stream,
            device_name,
        })
    }
}
