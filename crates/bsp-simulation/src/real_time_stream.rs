//! Real-time simulated sources paced by tokio timers

use crate::network::{MarkerOutlet, SampleOutlet, SimulatedNetwork};
use crate::signal_simulator::{SignalSimulator, SimulatorConfig};
use bsp_core::{BspResult, StreamInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

/// Commands for controlling a running source.
///
/// A paused sample source keeps its clock running and drops the frames; a
/// paused marker source skips its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCommand {
    Pause,
    Resume,
    Stop,
}

/// Marker emission schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSchedule {
    /// Labels emitted in order
    pub labels: Vec<String>,
    /// Time between consecutive markers
    pub interval: Duration,
    /// Start over after the last label
    pub repeat: bool,
}

impl Default for MarkerSchedule {
    fn default() -> Self {
        Self {
            labels: ["target", "nontarget", "nontarget", "nontarget"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            interval: Duration::from_millis(500),
            repeat: true,
        }
    }
}

/// Handle on a spawned source; the stream closes when the task ends
pub struct SourceHandle {
    info: StreamInfo,
    control: mpsc::Sender<SourceCommand>,
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn control_handle(&self) -> mpsc::Sender<SourceCommand> {
        self.control.clone()
    }

    /// Stop the source and wait for its outlet to close
    pub async fn stop(self) {
        let _ = self.control.send(SourceCommand::Stop).await;
        let _ = self.task.await;
    }
}

/// Publish a simulated device and stream it at its nominal rate.
///
/// Samples are stamped on a regular grid anchored at the network clock when
/// streaming starts. Must be called inside a tokio runtime.
pub fn spawn_sample_source(
    network: &SimulatedNetwork,
    content_type: &str,
    source_id: &str,
    config: SimulatorConfig,
) -> BspResult<SourceHandle> {
    let mut simulator = SignalSimulator::new(config)?;
    let outlet = network.publish_samples(content_type, source_id, simulator.config().description());
    let info = outlet.info().clone();
    let clock = network.clock();
    let (control, mut control_receiver) = mpsc::channel(8);

    let task = tokio::spawn(async move {
        let rate = simulator.config().sampling_rate;
        let mut ticker = interval(Duration::from_secs_f64(1.0 / rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let origin = clock.now();
        let mut running = true;

        info!(stream = %outlet.info().name, rate, "sample source started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timestamp = origin + simulator.elapsed();
                    let frame = simulator.next_frame();
                    // Paused frames are dropped, so the stream shows a timestamp gap
                    if running {
                        push_frame(&outlet, frame, timestamp);
                    }
                }
                command = control_receiver.recv() => {
                    match command {
                        Some(SourceCommand::Pause) => running = false,
                        Some(SourceCommand::Resume) => running = true,
                        Some(SourceCommand::Stop) | None => break,
                    }
                }
            }
        }

        info!(stream = %outlet.info().name, "sample source stopped");
    });

    Ok(SourceHandle { info, control, task })
}

fn push_frame(outlet: &SampleOutlet, frame: Vec<f64>, timestamp: f64) {
    let delivered = outlet.push_sample(frame, timestamp);
    if delivered == 0 {
        debug!(stream = %outlet.info().name, timestamp, "sample pushed with no subscribers");
    }
}

/// Publish a marker stream and emit `schedule` on the network clock.
///
/// Must be called inside a tokio runtime.
pub fn spawn_marker_source(
    network: &SimulatedNetwork,
    name: &str,
    content_type: &str,
    schedule: MarkerSchedule,
) -> SourceHandle {
    let outlet = network.publish_markers(name, content_type);
    let info = outlet.info().clone();
    let (control, mut control_receiver) = mpsc::channel(8);

    let task = tokio::spawn(async move {
        let mut ticker = interval(schedule.interval);
        // The first tick completes immediately; markers start one interval in
        ticker.tick().await;
        let mut labels = schedule.labels.iter().cycle().take(if schedule.repeat {
            usize::MAX
        } else {
            schedule.labels.len()
        });
        let mut running = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if running {
                        match labels.next() {
                            Some(label) => emit_marker(&outlet, label),
                            None => break,
                        }
                    }
                }
                command = control_receiver.recv() => {
                    match command {
                        Some(SourceCommand::Pause) => running = false,
                        Some(SourceCommand::Resume) => running = true,
                        Some(SourceCommand::Stop) | None => break,
                    }
                }
            }
        }

        info!(stream = %outlet.info().name, "marker source stopped");
    });

    SourceHandle { info, control, task }
}

fn emit_marker(outlet: &MarkerOutlet, label: &str) {
    outlet.push_marker_now(label);
    debug!(stream = %outlet.info().name, label, "marker emitted");
}
