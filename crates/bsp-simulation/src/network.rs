//! In-process publish/subscribe transport
//!
//! Stands in for a networked streaming layer: outlets publish samples or
//! markers, discovery finds them by content type, and every opened inlet
//! receives its own copy of everything pushed after it subscribed.

use bsp_core::{
    BspError, BspResult, MarkerInlet, SampleInlet, StreamDescription, StreamDiscovery, StreamInfo,
    StreamPredicate,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

type SampleFrame = (Vec<f64>, f64);
type MarkerFrame = (Vec<String>, f64);

/// Poll step used when a marker pull waits with a positive timeout
const MARKER_WAIT_STEP: Duration = Duration::from_millis(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Monotonic transport clock in seconds since the network was created
#[derive(Debug, Clone, Copy)]
pub struct SimulatedClock {
    origin: Instant,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

/// One published stream and its subscribers
struct Hub<T> {
    info: StreamInfo,
    description: StreamDescription,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T: Clone> Hub<T> {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(sender);
        receiver
    }

    /// Deliver a frame to every live subscriber, forgetting dropped ones
    fn broadcast(&self, frame: T) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|sender| sender.send(frame.clone()).is_ok());
        subscribers.len()
    }

    fn close(&self) {
        lock(&self.subscribers).clear();
    }
}

#[derive(Default)]
struct Registry {
    sample_streams: Vec<Arc<Hub<SampleFrame>>>,
    marker_streams: Vec<Arc<Hub<MarkerFrame>>>,
    next_uid: u64,
}

impl Registry {
    fn allocate_uid(&mut self) -> String {
        self.next_uid += 1;
        format!("sim-{}", self.next_uid)
    }

    fn unpublish(&mut self, uid: &str) {
        self.sample_streams.retain(|hub| hub.info.uid != uid);
        self.marker_streams.retain(|hub| hub.info.uid != uid);
    }
}

/// Cloneable handle on the simulated network
#[derive(Clone, Default)]
pub struct SimulatedNetwork {
    registry: Arc<Mutex<Registry>>,
    clock: SimulatedClock,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> SimulatedClock {
        self.clock
    }

    /// Publish a multi-channel sample stream
    pub fn publish_samples(
        &self,
        content_type: &str,
        source_id: &str,
        description: StreamDescription,
    ) -> SampleOutlet {
        let mut registry = lock(&self.registry);
        let uid = registry.allocate_uid();
        let hub = Arc::new(Hub {
            info: StreamInfo::new(&description.name, content_type, source_id, &uid),
            description,
            subscribers: Mutex::new(Vec::new()),
        });
        registry.sample_streams.push(Arc::clone(&hub));
        debug!(name = %hub.info.name, %uid, content_type, "published sample stream");

        SampleOutlet {
            hub,
            network: self.clone(),
        }
    }

    /// Publish a single-channel string marker stream
    pub fn publish_markers(&self, name: &str, content_type: &str) -> MarkerOutlet {
        let mut registry = lock(&self.registry);
        let uid = registry.allocate_uid();
        let hub = Arc::new(Hub {
            info: StreamInfo::new(name, content_type, "", &uid),
            description: StreamDescription {
                name: name.to_string(),
                nominal_srate: 0.0,
                channel_count: 1,
                channels: None,
            },
            subscribers: Mutex::new(Vec::new()),
        });
        registry.marker_streams.push(Arc::clone(&hub));
        debug!(name, %uid, content_type, "published marker stream");

        MarkerOutlet {
            hub,
            network: self.clone(),
        }
    }

    fn unpublish(&self, uid: &str) {
        lock(&self.registry).unpublish(uid);
    }
}

impl StreamDiscovery for SimulatedNetwork {
    type SampleInlet = SimulatedSampleInlet;
    type MarkerInlet = SimulatedMarkerInlet;

    fn resolve_streams(
        &self,
        content_type: &str,
        predicate: &StreamPredicate<'_>,
    ) -> BspResult<Vec<StreamInfo>> {
        let registry = lock(&self.registry);
        let samples = registry.sample_streams.iter().map(|hub| &hub.info);
        let markers = registry.marker_streams.iter().map(|hub| &hub.info);

        Ok(samples
            .chain(markers)
            .filter(|info| info.content_type == content_type && predicate(info))
            .cloned()
            .collect())
    }

    fn open_sample_inlet(&self, info: &StreamInfo) -> BspResult<SimulatedSampleInlet> {
        let hub = lock(&self.registry)
            .sample_streams
            .iter()
            .find(|hub| hub.info.uid == info.uid)
            .cloned()
            .ok_or_else(|| BspError::Transport {
                reason: format!("no sample stream with uid '{}'", info.uid),
            })?;

        Ok(SimulatedSampleInlet {
            receiver: hub.subscribe(),
            info: hub.info.clone(),
            description: hub.description.clone(),
        })
    }

    fn open_marker_inlet(&self, info: &StreamInfo) -> BspResult<SimulatedMarkerInlet> {
        let hub = lock(&self.registry)
            .marker_streams
            .iter()
            .find(|hub| hub.info.uid == info.uid)
            .cloned()
            .ok_or_else(|| BspError::Transport {
                reason: format!("no marker stream with uid '{}'", info.uid),
            })?;

        Ok(SimulatedMarkerInlet {
            receiver: hub.subscribe(),
            info: hub.info.clone(),
            description: hub.description.clone(),
        })
    }
}

/// Publishing side of a sample stream; dropping it closes the stream
pub struct SampleOutlet {
    hub: Arc<Hub<SampleFrame>>,
    network: SimulatedNetwork,
}

impl SampleOutlet {
    pub fn info(&self) -> &StreamInfo {
        &self.hub.info
    }

    /// Push one sample, returning how many inlets received it
    pub fn push_sample(&self, values: Vec<f64>, timestamp: f64) -> usize {
        self.hub.broadcast((values, timestamp))
    }

    /// Push one sample stamped with the network clock
    pub fn push_sample_now(&self, values: Vec<f64>) -> usize {
        self.push_sample(values, self.network.clock.now())
    }
}

impl Drop for SampleOutlet {
    fn drop(&mut self) {
        self.network.unpublish(&self.hub.info.uid);
        self.hub.close();
    }
}

/// Publishing side of a marker stream; dropping it closes the stream
pub struct MarkerOutlet {
    hub: Arc<Hub<MarkerFrame>>,
    network: SimulatedNetwork,
}

impl MarkerOutlet {
    pub fn info(&self) -> &StreamInfo {
        &self.hub.info
    }

    pub fn push_marker(&self, label: &str, timestamp: f64) -> usize {
        self.push_values(vec![label.to_string()], timestamp)
    }

    pub fn push_marker_now(&self, label: &str) -> usize {
        self.push_marker(label, self.network.clock.now())
    }

    /// Push a raw marker sample
    pub fn push_values(&self, values: Vec<String>, timestamp: f64) -> usize {
        self.hub.broadcast((values, timestamp))
    }
}

impl Drop for MarkerOutlet {
    fn drop(&mut self) {
        self.network.unpublish(&self.hub.info.uid);
        self.hub.close();
    }
}

/// Subscriber on a sample stream.
///
/// `pull_sample` blocks the calling thread; call it from a plain thread or
/// `tokio::task::spawn_blocking`, never from inside an async task.
pub struct SimulatedSampleInlet {
    receiver: mpsc::UnboundedReceiver<SampleFrame>,
    info: StreamInfo,
    description: StreamDescription,
}

impl SampleInlet for SimulatedSampleInlet {
    fn describe(&self) -> BspResult<StreamDescription> {
        Ok(self.description.clone())
    }

    fn pull_sample(&mut self) -> BspResult<(Vec<f64>, f64)> {
        self.receiver
            .blocking_recv()
            .ok_or_else(|| BspError::StreamClosed {
                stream: self.info.name.clone(),
            })
    }
}

/// Subscriber on a marker stream
pub struct SimulatedMarkerInlet {
    receiver: mpsc::UnboundedReceiver<MarkerFrame>,
    info: StreamInfo,
    description: StreamDescription,
}

impl MarkerInlet for SimulatedMarkerInlet {
    fn describe(&self) -> BspResult<StreamDescription> {
        Ok(self.description.clone())
    }

    fn pull_marker(&mut self, timeout: Duration) -> BspResult<Option<(Vec<String>, f64)>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => return Ok(Some(frame)),
                Err(TryRecvError::Disconnected) => {
                    return Err(BspError::StreamClosed {
                        stream: self.info.name.clone(),
                    })
                }
                Err(TryRecvError::Empty) if Instant::now() >= deadline => return Ok(None),
                Err(TryRecvError::Empty) => std::thread::sleep(MARKER_WAIT_STEP),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_core::ChannelDescription;

    fn eeg_description(channels: usize) -> StreamDescription {
        StreamDescription {
            name: "SimAmp".to_string(),
            nominal_srate: 100.0,
            channel_count: channels,
            channels: Some(
                (0..channels)
                    .map(|i| ChannelDescription::labelled(&format!("ch{}", i + 1)))
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_discovery_filters_by_content_type_and_predicate() {
        let network = SimulatedNetwork::new();
        let _eeg = network.publish_samples("EEG", "amp-1", eeg_description(2));
        let _other = network.publish_samples("EEG", "amp-2", eeg_description(2));
        let _markers = network.publish_markers("Stim", "Markers");

        let all_eeg = network.resolve_streams("EEG", &|_| true).unwrap();
        assert_eq!(all_eeg.len(), 2);
        assert_eq!(all_eeg[0].source_id, "amp-1");

        let filtered = network
            .resolve_streams("EEG", &|info: &StreamInfo| info.source_id == "amp-2")
            .unwrap();
        assert_eq!(filtered.len(), 1);

        let markers = network.resolve_streams("Markers", &|_| true).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "Stim");

        assert!(network.resolve_streams("EMG", &|_| true).unwrap().is_empty());
    }

    #[test]
    fn test_inlet_receives_samples_after_subscribing() {
        let network = SimulatedNetwork::new();
        let outlet = network.publish_samples("EEG", "", eeg_description(2));
        assert_eq!(outlet.push_sample(vec![0.0, 0.0], 0.5), 0);

        let info = network.resolve_streams("EEG", &|_| true).unwrap().remove(0);
        let mut inlet = network.open_sample_inlet(&info).unwrap();
        assert_eq!(outlet.push_sample(vec![1.0, 2.0], 1.0), 1);

        let (values, ts) = inlet.pull_sample().unwrap();
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(ts, 1.0);
        assert_eq!(inlet.describe().unwrap().channel_count, 2);
    }

    #[test]
    fn test_dropping_outlet_closes_inlets() {
        let network = SimulatedNetwork::new();
        let outlet = network.publish_samples("EEG", "", eeg_description(1));
        let info = network.resolve_streams("EEG", &|_| true).unwrap().remove(0);
        let mut inlet = network.open_sample_inlet(&info).unwrap();

        outlet.push_sample(vec![3.0], 1.0);
        drop(outlet);

        assert!(inlet.pull_sample().is_ok());
        assert!(matches!(
            inlet.pull_sample(),
            Err(BspError::StreamClosed { .. })
        ));
        assert!(network.resolve_streams("EEG", &|_| true).unwrap().is_empty());
    }

    #[test]
    fn test_zero_timeout_marker_poll_does_not_block() {
        let network = SimulatedNetwork::new();
        let outlet = network.publish_markers("Stim", "Markers");
        let info = network.resolve_streams("Markers", &|_| true).unwrap().remove(0);
        let mut inlet = network.open_marker_inlet(&info).unwrap();

        assert_eq!(inlet.pull_marker(Duration::ZERO).unwrap(), None);

        outlet.push_marker("target", 4.0);
        let (values, ts) = inlet.pull_marker(Duration::ZERO).unwrap().unwrap();
        assert_eq!(values, vec!["target".to_string()]);
        assert_eq!(ts, 4.0);
    }

    #[test]
    fn test_marker_poll_with_timeout_expires() {
        let network = SimulatedNetwork::new();
        let _outlet = network.publish_markers("Stim", "Markers");
        let info = network.resolve_streams("Markers", &|_| true).unwrap().remove(0);
        let mut inlet = network.open_marker_inlet(&info).unwrap();

        let started = Instant::now();
        assert_eq!(inlet.pull_marker(Duration::from_millis(5)).unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = SimulatedClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
