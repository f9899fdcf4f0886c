//! Presentation-side handle to the coordinator.
//!
//! The presentation adapter never touches the index directly; it pulls
//! through this handle and the request is resolved inside the coordination
//! loop. Replies come back over oneshot channels.

use tokio::sync::{mpsc, oneshot};

use crate::coordinator::{CoordinatorEvent, ImageOutcome};

/// Cloneable handle for pull requests and control events.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events_tx: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub(crate) fn new(events_tx: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self { events_tx }
    }

    /// Request the image for a presentation slot (most-recent-first).
    ///
    /// `Ready` when already staged, `Pending` when a download was started
    /// (a `RefreshSlot` notification follows), `Unavailable` when the slot
    /// is out of range — or when the coordinator is gone.
    pub async fn request_image(&self, slot: usize) -> ImageOutcome {
        let (reply, rx) = oneshot::channel();
        if self
            .events_tx
            .send(CoordinatorEvent::ImageRequest { slot, reply })
            .await
            .is_err()
        {
            return ImageOutcome::Unavailable;
        }
        rx.await.unwrap_or(ImageOutcome::Unavailable)
    }

    /// Number of acquired records. Zero when the coordinator is gone.
    pub async fn count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self
            .events_tx
            .send(CoordinatorEvent::Count { reply })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Inform the coordinator of background/foreground transitions.
    pub async fn set_background(&self, background: bool) {
        let _ = self
            .events_tx
            .send(CoordinatorEvent::SetBackground(background))
            .await;
    }
}
