//! BSP-Acquisition: sample/marker acquisition client
//!
//! Binds a multi-channel sample stream and a marker stream, reconciles the
//! device metadata with the caller's configuration and merges both streams
//! into one record per sample.

pub mod channels;
pub mod config;
pub mod connector;
pub mod device;
pub mod merger;
pub mod negotiator;

pub use channels::{AppendedChannels, TIMESTAMP_CHANNEL, TRIGGER_CHANNEL};
pub use config::{AcquisitionConfig, ConnectionParams, EmptyMarkerPolicy};
pub use connector::{resolve_device_name, Connection, DeviceConnector, FALLBACK_DEVICE_NAME};
pub use device::LslDevice;
pub use merger::{MarkerSlot, SampleMarkerMerger};
pub use negotiator::MetadataNegotiator;
