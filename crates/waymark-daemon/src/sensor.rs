//! Position sensor boundary.
//!
//! The coordinator drives the sensor through [`PositionSensor`]; the sensor
//! feeds its lifecycle back into the coordination loop as
//! [`SensorEvent`]s. Accuracy/authorization semantics of the underlying
//! positioning service are the sensor's concern, not ours.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use waymark_core::types::{AuthorizationStatus, PositionSample, SensorFault};

use crate::coordinator::CoordinatorEvent;

/// Lifecycle events emitted by the position sensor into the coordination
/// loop.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// A batch of raw samples, in arrival order. The sensor stacks updates
    /// while deferring, so batches larger than one are normal.
    Samples(Vec<PositionSample>),
    /// The platform judged the device stationary and paused updates.
    Paused,
    AuthorizationChanged(AuthorizationStatus),
    /// A deferred-updates request completed, successfully or not.
    DeferredUpdatesFinished { error: Option<String> },
    Failed(SensorFault),
}

/// Control surface of the position sensor. All methods are fire-and-forget;
/// results come back as [`SensorEvent`]s.
pub trait PositionSensor: Send + Sync + 'static {
    fn start(&self);
    fn stop(&self);
    /// Configure auto-pause/background flags for foreground vs background
    /// execution.
    fn set_background_mode(&self, background: bool);
    /// Suppress wake-ups until `until_traveled_m` further displacement or
    /// `timeout`, whichever comes first.
    fn defer_updates(&self, until_traveled_m: f64, timeout: Duration);
}

/// Sensor implementation that replays JSONL-encoded [`PositionSample`] lines
/// from a file, one batch per line interval. Lets the daemon run without
/// platform location hardware.
pub struct ReplaySensor {
    path: PathBuf,
    events_tx: mpsc::Sender<CoordinatorEvent>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl ReplaySensor {
    pub fn new(path: PathBuf, events_tx: mpsc::Sender<CoordinatorEvent>, interval: Duration) -> Self {
        Self {
            path,
            events_tx,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PositionSensor for ReplaySensor {
    fn start(&self) {
        // Only one reader task at a time; a re-issued start while running is
        // a no-op, matching a real sensor's behavior.
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let path = self.path.clone();
        let tx = self.events_tx.clone();
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        tokio::spawn(async move {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read replay file");
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };
            for line in content.lines() {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<PositionSample>(line) {
                    Ok(sample) => {
                        let event = CoordinatorEvent::Sensor(SensorEvent::Samples(vec![sample]));
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping malformed replay line"),
                }
                tokio::time::sleep(interval).await;
            }
            running.store(false, Ordering::SeqCst);
            debug!(path = %path.display(), "replay exhausted");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_background_mode(&self, _background: bool) {}

    fn defer_updates(&self, _until_traveled_m: f64, _timeout: Duration) {
        // No radio to quiet. Report immediate completion so the filter's
        // deferring flag clears.
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let event =
                CoordinatorEvent::Sensor(SensorEvent::DeferredUpdatesFinished { error: None });
            let _ = tx.send(event).await;
        });
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::time::timeout;

    fn replay_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    async fn recv_samples(rx: &mut mpsc::Receiver<CoordinatorEvent>) -> Vec<PositionSample> {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event should arrive")
            .expect("channel should stay open");
        match event {
            CoordinatorEvent::Sensor(SensorEvent::Samples(samples)) => samples,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn replays_lines_and_skips_malformed_ones() {
        let file = replay_file(&[
            r#"{"latitude": 1.0, "longitude": 2.0, "horizontal_accuracy": 10.0, "timestamp": "2026-01-01T00:00:00Z"}"#,
            "not json",
            r#"{"latitude": 3.0, "longitude": 4.0, "horizontal_accuracy": 10.0, "timestamp": "2026-01-01T00:00:01Z"}"#,
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let sensor = ReplaySensor::new(file.path().to_path_buf(), tx, Duration::from_millis(1));

        sensor.start();

        let first = recv_samples(&mut rx).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].latitude, 1.0);
        let second = recv_samples(&mut rx).await;
        assert_eq!(second[0].latitude, 3.0);
    }

    #[tokio::test]
    async fn stop_halts_the_replay() {
        let file = replay_file(&[
            r#"{"latitude": 1.0, "longitude": 2.0, "horizontal_accuracy": 10.0, "timestamp": "2026-01-01T00:00:00Z"}"#,
            r#"{"latitude": 3.0, "longitude": 4.0, "horizontal_accuracy": 10.0, "timestamp": "2026-01-01T00:00:01Z"}"#,
        ]);
        let (tx, mut rx) = mpsc::channel(16);
        let sensor =
            ReplaySensor::new(file.path().to_path_buf(), tx, Duration::from_millis(50));

        sensor.start();
        let first = recv_samples(&mut rx).await;
        assert_eq!(first[0].latitude, 1.0);

        sensor.stop();
        let next = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(next.is_err(), "no further samples after stop");
    }

    #[tokio::test]
    async fn defer_updates_reports_immediate_completion() {
        let (tx, mut rx) = mpsc::channel(16);
        let sensor = ReplaySensor::new(PathBuf::from("/nonexistent"), tx, Duration::from_millis(1));

        sensor.defer_updates(100.0, Duration::from_secs(60));

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("completion should arrive")
            .unwrap();
        assert!(matches!(
            event,
            CoordinatorEvent::Sensor(SensorEvent::DeferredUpdatesFinished { error: None })
        ));
    }
}
