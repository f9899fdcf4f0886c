//! The single coordination loop of the acquisition pipeline.
//!
//! One task owns the signal filter and the photo index. The sensor, both
//! fetch pipelines, and the presentation handle are all producers feeding
//! one event channel; nothing mutates shared state from a completion
//! thread. Fetches are fire-and-forget: the coordinator spawns them and the
//! completion re-enters the loop as a separate event, so no handler ever
//! blocks on network IO.
//!
//! Ordering: index order equals metadata *arrival* order, not the emission
//! order of the qualifying events that triggered the fetches. Across
//! producers there is no ordering guarantee and the handlers are correct
//! under arbitrary interleaving. In-flight fetches are never cancelled;
//! late completions for retracted records are silent no-ops.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use waymark_core::error::SensorError;
use waymark_core::filter::{FilterConfig, SensorDirective, SignalFilter};
use waymark_core::index::PhotoIndex;
use waymark_core::types::{PhotoRecord, QualifyingEvent, SensorFault};

use crate::fetch::{ImageService, MetadataService};
use crate::handle::CoordinatorHandle;
use crate::sensor::{PositionSensor, SensorEvent};

/// Everything that can enter the coordination loop.
#[derive(Debug)]
pub enum CoordinatorEvent {
    Sensor(SensorEvent),
    /// A metadata fetch completed with a parseable record.
    MetadataFetched(PhotoRecord),
    /// A metadata fetch failed or was unparsable. The qualifying event is
    /// lost; nothing is inserted and no notification fires.
    MetadataFailed { latitude: f64, longitude: f64 },
    ImageFetched { id: String, path: PathBuf },
    ImageFetchFailed { id: String },
    /// Presentation pull for the image at a slot (most-recent-first).
    ImageRequest {
        slot: usize,
        reply: oneshot::Sender<ImageOutcome>,
    },
    Count { reply: oneshot::Sender<usize> },
    /// App moved to or from background execution.
    SetBackground(bool),
}

/// Reply to an [`CoordinatorEvent::ImageRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// Already staged locally.
    Ready(PathBuf),
    /// Download started; a targeted refresh will follow.
    Pending,
    /// Slot out of range.
    Unavailable,
}

/// Push notification to the presentation adapter. Receivers must re-fetch
/// current state on every notification rather than caching slots: slots
/// shift as records are inserted and removed.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewNotification {
    /// The index changed; re-read everything.
    RefreshAll,
    /// The image for one slot became available.
    RefreshSlot(usize),
    /// A hard sensor error the user should be told about.
    SensorAlert(SensorError),
}

pub struct Coordinator {
    filter: SignalFilter,
    index: PhotoIndex,
    sensor: Arc<dyn PositionSensor>,
    metadata: Arc<dyn MetadataService>,
    images: Arc<dyn ImageService>,
    /// Receives events from all producers.
    events_rx: mpsc::Receiver<CoordinatorEvent>,
    /// Cloned into spawned fetches so completions re-enter the loop.
    events_tx: mpsc::Sender<CoordinatorEvent>,
    /// Broadcasts refreshes to the presentation adapter.
    notify_tx: broadcast::Sender<ViewNotification>,
    /// Deadline of the one-shot restart timer. Cancel-and-replace: arming
    /// overwrites any pending deadline, so at most one restart is ever
    /// outstanding.
    restart_at: Option<Instant>,
    cancel: CancellationToken,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FilterConfig,
        sensor: Arc<dyn PositionSensor>,
        metadata: Arc<dyn MetadataService>,
        images: Arc<dyn ImageService>,
        events_rx: mpsc::Receiver<CoordinatorEvent>,
        events_tx: mpsc::Sender<CoordinatorEvent>,
        notify_tx: broadcast::Sender<ViewNotification>,
    ) -> Self {
        Self::with_cancel(
            config,
            sensor,
            metadata,
            images,
            events_rx,
            events_tx,
            notify_tx,
            CancellationToken::new(),
        )
    }

    /// Create a coordinator with an explicit cancellation token for graceful
    /// shutdown.
    #[allow(clippy::too_many_arguments)]
    pub fn with_cancel(
        config: FilterConfig,
        sensor: Arc<dyn PositionSensor>,
        metadata: Arc<dyn MetadataService>,
        images: Arc<dyn ImageService>,
        events_rx: mpsc::Receiver<CoordinatorEvent>,
        events_tx: mpsc::Sender<CoordinatorEvent>,
        notify_tx: broadcast::Sender<ViewNotification>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            filter: SignalFilter::new(config),
            index: PhotoIndex::new(),
            sensor,
            metadata,
            images,
            events_rx,
            events_tx,
            notify_tx,
            restart_at: None,
            cancel,
        }
    }

    /// Handle for presentation-side pulls and control.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.events_tx.clone())
    }

    /// Begin tracking: starts the signal filter and the sensor.
    pub fn start(&mut self) {
        let directives = self.filter.start();
        self.apply_directives(directives);
    }

    /// Main event loop. Runs until the event channel closes or the
    /// cancellation token fires.
    pub async fn run(&mut self) {
        info!("coordinator: event loop started");
        loop {
            let restart_at = self.restart_at;
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("coordinator: event channel closed, shutting down");
                            break;
                        }
                    }
                }
                _ = sleep_until(restart_at.unwrap_or_else(Instant::now)), if restart_at.is_some() => {
                    self.restart_at = None;
                    info!("coordinator: restart timer fired, resuming updates");
                    let directives = self.filter.start();
                    self.apply_directives(directives);
                }
                _ = self.cancel.cancelled() => {
                    info!("coordinator: cancellation requested, shutting down");
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Sensor(event) => self.handle_sensor_event(event),
            CoordinatorEvent::MetadataFetched(record) => self.handle_metadata_fetched(record),
            CoordinatorEvent::MetadataFailed {
                latitude,
                longitude,
            } => {
                // Silent drop: the qualifying event is lost, no retry.
                debug!(latitude, longitude, "metadata fetch failed, dropping event");
            }
            CoordinatorEvent::ImageFetched { id, path } => self.handle_image_fetched(id, path),
            CoordinatorEvent::ImageFetchFailed { id } => self.handle_image_failed(&id),
            CoordinatorEvent::ImageRequest { slot, reply } => {
                let outcome = self.resolve_image_request(slot);
                let _ = reply.send(outcome);
            }
            CoordinatorEvent::Count { reply } => {
                let _ = reply.send(self.index.len());
            }
            CoordinatorEvent::SetBackground(background) => {
                let directives = if background {
                    self.filter.enter_background()
                } else {
                    self.filter.enter_foreground()
                };
                self.apply_directives(directives);
            }
        }
    }

    // ─── Sensor path ─────────────────────────────────────────────

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Samples(samples) => {
                let outcome = self.filter.on_samples(&samples);
                debug!(
                    received = samples.len(),
                    qualifying = outcome.events.len(),
                    "sensor samples filtered"
                );
                self.apply_directives(outcome.directives);
                for event in outcome.events {
                    self.spawn_metadata_fetch(event);
                }
            }
            SensorEvent::Paused => {
                info!("sensor paused updates, scheduling restart");
                let directives = self.filter.on_paused();
                self.apply_directives(directives);
            }
            SensorEvent::AuthorizationChanged(status) => {
                let outcome = self.filter.on_authorization_changed(status);
                self.apply_directives(outcome.directives);
                if let Some(error) = outcome.error {
                    self.surface(error);
                }
            }
            SensorEvent::DeferredUpdatesFinished { error } => {
                if let Some(detail) = &error {
                    debug!(detail = %detail, "deferred updates finished with error");
                }
                self.filter.on_deferral_finished(error.as_deref());
            }
            SensorEvent::Failed(fault) => {
                if let SensorFault::Other(detail) = &fault {
                    warn!(detail = %detail, "sensor failure swallowed");
                }
                let outcome = self.filter.on_failure(&fault);
                self.apply_directives(outcome.directives);
                if let Some(error) = outcome.error {
                    self.surface(error);
                }
            }
        }
    }

    fn apply_directives(&mut self, directives: Vec<SensorDirective>) {
        for directive in directives {
            match directive {
                SensorDirective::Start => self.sensor.start(),
                SensorDirective::Stop => self.sensor.stop(),
                SensorDirective::DeferUpdates {
                    until_traveled_m,
                    timeout,
                } => self.sensor.defer_updates(until_traveled_m, timeout),
                SensorDirective::ScheduleRestart { delay } => {
                    self.restart_at = Some(Instant::now() + delay);
                }
                SensorDirective::ConfigureBackground { background } => {
                    self.sensor.set_background_mode(background);
                }
            }
        }
    }

    fn surface(&self, error: SensorError) {
        warn!(error = %error, "sensor error surfaced");
        // Ignore send errors — no subscribers is fine.
        let _ = self.notify_tx.send(ViewNotification::SensorAlert(error));
    }

    // ─── Metadata pipeline ───────────────────────────────────────

    fn spawn_metadata_fetch(&self, event: QualifyingEvent) {
        let service = Arc::clone(&self.metadata);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let message = match service.fetch(event.latitude, event.longitude).await {
                Ok(record) => CoordinatorEvent::MetadataFetched(record),
                Err(e) => {
                    debug!(error = %e, "metadata fetch error");
                    CoordinatorEvent::MetadataFailed {
                        latitude: event.latitude,
                        longitude: event.longitude,
                    }
                }
            };
            let _ = tx.send(message).await;
        });
    }

    fn handle_metadata_fetched(&mut self, record: PhotoRecord) {
        debug!(id = %record.id, "metadata record arrived");
        // Dedup by id, not by position: a duplicate leaves the index
        // untouched. The refresh fires either way.
        self.index.insert(record);
        let _ = self.notify_tx.send(ViewNotification::RefreshAll);
    }

    // ─── Image pipeline ──────────────────────────────────────────

    fn resolve_image_request(&mut self, slot: usize) -> ImageOutcome {
        let record = self
            .index
            .slot_to_position(slot)
            .and_then(|position| self.index.record_at(position));
        match record {
            None => ImageOutcome::Unavailable,
            Some(record) => match &record.local_path {
                Some(path) => ImageOutcome::Ready(path.clone()),
                None => {
                    self.spawn_image_fetch(record.clone());
                    ImageOutcome::Pending
                }
            },
        }
    }

    fn spawn_image_fetch(&self, record: PhotoRecord) {
        let future = self.images.fetch(&record);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let message = match future.await {
                Ok(path) => CoordinatorEvent::ImageFetched {
                    id: record.id,
                    path,
                },
                Err(e) => {
                    debug!(id = %record.id, error = %e, "image fetch error");
                    CoordinatorEvent::ImageFetchFailed { id: record.id }
                }
            };
            let _ = tx.send(message).await;
        });
    }

    fn handle_image_fetched(&mut self, id: String, path: PathBuf) {
        if !self.index.attach_local(&id, path) {
            // The record was retracted while the download was in flight.
            debug!(id = %id, "image completed for a record no longer indexed");
            return;
        }
        if let Some(position) = self.index.position_of(&id) {
            let slot = self.index.position_to_slot(position);
            debug!(id = %id, slot, "image staged, targeted refresh");
            let _ = self.notify_tx.send(ViewNotification::RefreshSlot(slot));
        }
    }

    /// A metadata entry with no retrievable image is not worth keeping:
    /// retract it entirely. No retry, no placeholder, no notification.
    fn handle_image_failed(&mut self, id: &str) {
        if self.index.remove(id) {
            debug!(id = %id, "image fetch failed, record retracted");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
