//! Acquisition device: connect → resolve → read
//!
//! [`LslDevice`] drives one session over any [`StreamDiscovery`] backend. It
//! is a single-consumer object: `read` takes `&mut self`, so concurrent reads
//! must be serialized by the owner.

use crate::channels::AppendedChannels;
use crate::config::AcquisitionConfig;
use crate::connector::{resolve_device_name, Connection, DeviceConnector};
use crate::merger::{MarkerSlot, SampleMarkerMerger};
use crate::negotiator::MetadataNegotiator;
use bsp_core::{
    BspError, BspResult, DeviceDescriptor, DeviceInfo, MarkerInlet, Record, SampleInlet,
    StreamDiscovery,
};
use tracing::{debug, info, info_span, Span};
use uuid::Uuid;

/// Acquisition client for one sample stream plus one marker stream
pub struct LslDevice<D: StreamDiscovery> {
    discovery: D,
    config: AcquisitionConfig,
    connector: DeviceConnector,
    negotiator: MetadataNegotiator,
    appended: AppendedChannels,
    session_id: Uuid,
    span: Span,
    connection: Option<Connection<D::SampleInlet, D::MarkerInlet>>,
    device_info: Option<DeviceInfo>,
    merger: Option<SampleMarkerMerger>,
}

impl<D: StreamDiscovery> LslDevice<D> {
    /// Create a device; nothing is connected yet
    pub fn new(discovery: D, config: AcquisitionConfig) -> BspResult<Self> {
        config.validate()?;

        let session_id = Uuid::new_v4();
        let span = info_span!("acquisition", session = %session_id);

        Ok(Self {
            connector: DeviceConnector::new(config.connection.clone()),
            negotiator: MetadataNegotiator::from_config(&config),
            appended: AppendedChannels::new(config.include_timestamp),
            discovery,
            config,
            session_id,
            span,
            connection: None,
            device_info: None,
            merger: None,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Device name; fixed at connect time
    pub fn name(&self) -> String {
        match &self.connection {
            Some(connection) => connection.device_name().to_string(),
            None => resolve_device_name(self.config.connection.stream_name.as_deref(), None),
        }
    }

    /// Bind both streams, replacing any previous connection
    pub fn connect(&mut self) -> BspResult<()> {
        let span = self.span.clone();
        let _guard = span.enter();

        self.disconnect();
        self.connection = Some(self.connector.connect(&self.discovery)?);
        Ok(())
    }

    /// Read the device metadata once and reconcile it with the configuration
    pub fn resolve(&mut self) -> BspResult<DeviceInfo> {
        let span = self.span.clone();
        let _guard = span.enter();

        let connection = self.connection.as_ref().ok_or(BspError::Precondition {
            reason: "connect() is required before resolve()",
        })?;
        if let Some(info) = &self.device_info {
            return Ok(info.clone());
        }

        let description = connection.sample_inlet().describe()?;
        debug!(?description, "sample stream description");
        debug!(description = ?connection.marker_inlet().describe()?, "marker stream description");

        let descriptor = DeviceDescriptor::from_description(&description);
        let device_info = self.negotiator.resolve(connection.device_name(), &descriptor)?;

        info!(
            device = %device_info.name,
            sample_rate = device_info.sample_rate,
            channels = device_info.channels.len(),
            "acquisition initialized"
        );

        self.merger = Some(SampleMarkerMerger::new(
            descriptor.raw_channel_count,
            self.appended,
            self.config.empty_marker_policy,
        ));
        self.device_info = Some(device_info.clone());
        Ok(device_info)
    }

    /// Pull the next sample and return its merged record
    pub fn read(&mut self) -> BspResult<Record> {
        let span = self.span.clone();
        let _guard = span.enter();

        let connection = self.connection.as_mut().ok_or(BspError::Precondition {
            reason: "connect() is required before read()",
        })?;
        let merger = self.merger.as_mut().ok_or(BspError::Precondition {
            reason: "resolve() is required before read()",
        })?;

        merger.read(&mut connection.sample_inlet, &mut connection.marker_inlet)
    }

    /// Negotiated metadata, available after `resolve`
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Resolved channel list, empty before `resolve`
    pub fn channels(&self) -> &[String] {
        self.device_info
            .as_ref()
            .map(|info| info.channels.as_slice())
            .unwrap_or(&[])
    }

    /// Marker currently waiting for a sample
    pub fn pending_marker(&self) -> Option<&MarkerSlot> {
        self.merger.as_ref().map(SampleMarkerMerger::pending)
    }

    /// Release both inlets and forget the negotiated session
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!(device = %connection.device_name(), "releasing stream inlets");
        }
        self.device_info = None;
        self.merger = None;
    }
}

impl<D: StreamDiscovery> Drop for LslDevice<D> {
    fn drop(&mut self) {
        let span = self.span.clone();
        let _guard = span.enter();
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_simulation::{SimulatedNetwork, SimulatorConfig};

    #[test]
    fn test_resolve_before_connect_is_precondition_error() {
        let mut device =
            LslDevice::new(SimulatedNetwork::new(), AcquisitionConfig::default()).unwrap();
        assert!(matches!(device.resolve(), Err(BspError::Precondition { .. })));
        assert!(matches!(device.read(), Err(BspError::Precondition { .. })));
    }

    #[test]
    fn test_read_before_resolve_is_precondition_error() {
        let network = SimulatedNetwork::new();
        let _samples = network.publish_samples(
            "EEG",
            "",
            SimulatorConfig::with_channels(2, 100.0).description(),
        );
        let _markers = network.publish_markers("Stim", "Markers");

        let mut device = LslDevice::new(network, AcquisitionConfig::default()).unwrap();
        device.connect().unwrap();
        assert!(matches!(device.read(), Err(BspError::Precondition { .. })));
    }

    #[test]
    fn test_name_before_connect() {
        let device =
            LslDevice::new(SimulatedNetwork::new(), AcquisitionConfig::default()).unwrap();
        assert_eq!(device.name(), "LSL");

        let named = LslDevice::new(
            SimulatedNetwork::new(),
            AcquisitionConfig::default().with_stream_name("amp"),
        )
        .unwrap();
        assert_eq!(named.name(), "amp");
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = AcquisitionConfig::default().with_sample_rate(f64::NAN);
        assert!(LslDevice::new(SimulatedNetwork::new(), config).is_err());
    }

    #[test]
    fn test_disconnect_forgets_session() {
        let network = SimulatedNetwork::new();
        let _samples = network.publish_samples(
            "EEG",
            "",
            SimulatorConfig::with_channels(2, 100.0).description(),
        );
        let _markers = network.publish_markers("Stim", "Markers");

        let mut device = LslDevice::new(network, AcquisitionConfig::default()).unwrap();
        device.connect().unwrap();
        device.resolve().unwrap();
        assert_eq!(device.channels(), ["ch1", "ch2", "TRG"]);

        device.disconnect();
        assert!(!device.is_connected());
        assert!(device.device_info().is_none());
        assert!(device.channels().is_empty());
    }
}
