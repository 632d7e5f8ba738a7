//! Handle to a running capture controller
//!
//! This is the surface the UI talks to: three intents, teardown, and
//! read-only access to the current snapshot.

use super::controller::CaptureEvent;
use super::session::Message;
use super::state::{CaptureSnapshot, CaptureState};
use crate::utils::error::{CaptureError, CaptureResult};
use tokio::sync::{broadcast, mpsc, watch};

/// Cloneable handle to a capture controller task
///
/// The controller tears itself down once every handle is dropped.
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::UnboundedSender<Message>,
    snapshots: watch::Receiver<CaptureSnapshot>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Message>,
        snapshots: watch::Receiver<CaptureSnapshot>,
        events: broadcast::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            tx,
            snapshots,
            events,
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> CaptureState {
        self.snapshots.borrow().state
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Start recording on an already granted stream; no-op otherwise
    pub fn start_recording(&self) -> CaptureResult<()> {
        self.send(Message::StartRecording)
    }

    /// Stop the active recorder; no-op when not recording
    pub fn stop_recording(&self) -> CaptureResult<()> {
        self.send(Message::StopRecording)
    }

    /// Ask for display media access and start recording once granted.
    ///
    /// Ignored while a request is in flight or a recorder is running.
    pub fn request_permissions_and_start_recording(&self) -> CaptureResult<()> {
        self.send(Message::RequestStart)
    }

    /// Tear the controller down, releasing any held stream.
    ///
    /// Idempotent: disposing an already disposed controller does nothing.
    pub fn dispose(&self) {
        let _ = self.tx.send(Message::Dispose);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the controller task has finished tearing down
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> CaptureResult<CaptureSnapshot>
    where
        F: FnMut(&CaptureSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| CaptureError::ControllerClosed)?;
        Ok(snapshot.clone())
    }

    fn send(&self, message: Message) -> CaptureResult<()> {
        self.tx
            .send(message)
            .map_err(|_| CaptureError::ControllerClosed)
    }
}
