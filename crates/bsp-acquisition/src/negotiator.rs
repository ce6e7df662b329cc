//! Reconciles device-reported metadata with the caller's expectations

use crate::channels::AppendedChannels;
use crate::config::AcquisitionConfig;
use bsp_core::{BspError, BspResult, DeviceDescriptor, DeviceInfo};
use tracing::debug;

/// Channel list and sample rate reconciliation.
///
/// Caller values win when the device has nothing to say; when both sides
/// report something they must agree.
#[derive(Debug, Clone)]
pub struct MetadataNegotiator {
    channels: Option<Vec<String>>,
    sample_rate: Option<f64>,
    appended: AppendedChannels,
}

impl MetadataNegotiator {
    pub fn new(
        channels: Option<Vec<String>>,
        sample_rate: Option<f64>,
        appended: AppendedChannels,
    ) -> Self {
        Self {
            channels: channels.filter(|channels| !channels.is_empty()),
            sample_rate,
            appended,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(
            config.configured_channels().map(<[String]>::to_vec),
            config.sample_rate,
            AppendedChannels::new(config.include_timestamp),
        )
    }

    /// Produce the frozen session metadata for `descriptor`
    pub fn resolve(
        &self,
        device_name: &str,
        descriptor: &DeviceDescriptor,
    ) -> BspResult<DeviceInfo> {
        let raw_channels = self.resolve_raw_channels(descriptor)?;
        let channels = self.appended.append_to(&raw_channels);

        let expected = descriptor.raw_channel_count + self.appended.len();
        if channels.len() != expected {
            return Err(BspError::ChannelCount {
                expected,
                actual: channels.len(),
            });
        }

        let sample_rate = self.resolve_sample_rate(descriptor)?;

        debug!(device = device_name, ?channels, sample_rate, "metadata resolved");

        Ok(DeviceInfo {
            name: device_name.to_string(),
            sample_rate,
            channels,
        })
    }

    fn resolve_raw_channels(&self, descriptor: &DeviceDescriptor) -> BspResult<Vec<String>> {
        let reported = &descriptor.raw_channel_labels;
        match &self.channels {
            None if reported.is_empty() => Err(BspError::configuration(
                "channels must be provided: the device reports no channel labels",
            )),
            None => Ok(reported.clone()),
            // Device metadata is advisory when it carries no labels
            Some(configured) if reported.is_empty() => Ok(configured.clone()),
            Some(configured) if configured != reported => Err(BspError::ChannelMismatch {
                configured: configured.clone(),
                reported: reported.clone(),
            }),
            Some(configured) => Ok(configured.clone()),
        }
    }

    fn resolve_sample_rate(&self, descriptor: &DeviceDescriptor) -> BspResult<f64> {
        let reported = descriptor.nominal_sample_rate;
        match self.sample_rate {
            None => Ok(reported),
            Some(configured) if configured != reported => Err(BspError::RateMismatch {
                configured,
                reported,
            }),
            Some(configured) => Ok(configured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(labels: &[&str], count: usize, rate: f64) -> DeviceDescriptor {
        DeviceDescriptor {
            reported_name: "amp".to_string(),
            nominal_sample_rate: rate,
            raw_channel_count: count,
            raw_channel_labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn names(labels: &[&str]) -> Option<Vec<String>> {
        Some(labels.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn test_adopts_device_labels_and_rate() {
        let negotiator = MetadataNegotiator::new(None, None, AppendedChannels::new(true));
        let info = negotiator
            .resolve("amp", &descriptor(&["Fz", "Cz"], 2, 256.0))
            .unwrap();
        assert_eq!(info.channels, vec!["Fz", "Cz", "LSL_timestamp", "TRG"]);
        assert_eq!(info.sample_rate, 256.0);
        assert_eq!(info.name, "amp");
    }

    #[test]
    fn test_no_channels_from_either_side() {
        let negotiator = MetadataNegotiator::new(None, None, AppendedChannels::new(false));
        let result = negotiator.resolve("amp", &descriptor(&[], 2, 256.0));
        assert!(matches!(result, Err(BspError::Configuration { .. })));
    }

    #[test]
    fn test_caller_list_used_when_device_has_none() {
        let negotiator = MetadataNegotiator::new(
            names(&["c1", "c2"]),
            Some(100.0),
            AppendedChannels::new(false),
        );
        let info = negotiator.resolve("amp", &descriptor(&[], 2, 100.0)).unwrap();
        assert_eq!(info.channels, vec!["c1", "c2", "TRG"]);
        assert_eq!(info.channels.len(), 3);
    }

    #[test]
    fn test_caller_and_device_disagree() {
        let negotiator = MetadataNegotiator::new(names(&["a"]), None, AppendedChannels::new(false));
        match negotiator.resolve("amp", &descriptor(&["b"], 1, 100.0)) {
            Err(BspError::ChannelMismatch { configured, reported }) => {
                assert_eq!(configured, vec!["a"]);
                assert_eq!(reported, vec!["b"]);
            }
            other => panic!("expected channel mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_matching_lists_accepted() {
        let negotiator =
            MetadataNegotiator::new(names(&["Fz", "Cz"]), None, AppendedChannels::new(false));
        assert!(negotiator.resolve("amp", &descriptor(&["Fz", "Cz"], 2, 100.0)).is_ok());
    }

    #[test]
    fn test_channel_count_checked() {
        let negotiator =
            MetadataNegotiator::new(names(&["c1", "c2", "c3"]), None, AppendedChannels::new(true));
        match negotiator.resolve("amp", &descriptor(&[], 2, 100.0)) {
            Err(BspError::ChannelCount { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 5);
            }
            other => panic!("expected channel count error, got {:?}", other),
        }
    }

    #[test]
    fn test_rate_mismatch() {
        let negotiator =
            MetadataNegotiator::new(names(&["c1"]), Some(100.0), AppendedChannels::new(false));
        let result = negotiator.resolve("amp", &descriptor(&["c1"], 1, 250.0));
        assert!(matches!(
            result,
            Err(BspError::RateMismatch {
                configured,
                reported,
            }) if configured == 100.0 && reported == 250.0
        ));
    }

    #[test]
    fn test_empty_caller_list_is_unset() {
        let negotiator =
            MetadataNegotiator::new(Some(Vec::new()), None, AppendedChannels::new(false));
        let info = negotiator.resolve("amp", &descriptor(&["x"], 1, 10.0)).unwrap();
        assert_eq!(info.channels, vec!["x", "TRG"]);
    }
}
