//! Capture session controller
//!
//! Owns the capture lifecycle. Intents and capability callbacks arrive as
//! messages on one mailbox and are reduced one at a time by a single task.

use super::config::CaptureConfig;
use super::handle::CaptureHandle;
use super::session::{Message, Session};
use super::state::{AudioArtifact, CaptureSnapshot, CaptureState, SessionId};
use crate::capture::traits::{DisplayMediaProvider, MediaStream, RecorderFactory, RecorderSink};
use crate::utils::error::{CaptureError, CaptureResult, ErrorResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Events emitted during capture
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Permission request issued
    RequestingAccess { session: SessionId },
    /// Recorder started
    Started { session: SessionId },
    /// Recorder asked to stop
    Stopped { session: SessionId },
    /// Artifact assembled
    ArtifactReady { session: SessionId, bytes: usize },
    /// Entered the error state
    Error(ErrorResponse),
    /// Controller torn down
    Disposed,
}

/// Single-writer state machine over one capture session at a time
pub struct CaptureController {
    config: CaptureConfig,
    provider: Arc<dyn DisplayMediaProvider>,
    recorders: Arc<dyn RecorderFactory>,

    state: CaptureState,
    session: Session,

    /// Chunk buffers of stopped sessions whose finalize has not fired yet
    finalizing: HashMap<SessionId, Vec<Vec<u8>>>,

    artifact: Option<AudioArtifact>,
    error: Option<CaptureError>,
    disposed: bool,

    /// Weak so that dropping every handle closes the mailbox
    mailbox: mpsc::WeakUnboundedSender<Message>,
    snapshot_tx: watch::Sender<CaptureSnapshot>,
    event_tx: broadcast::Sender<CaptureEvent>,
}

impl CaptureController {
    /// Spawn a controller task on the current tokio runtime
    pub fn spawn(
        config: CaptureConfig,
        provider: Arc<dyn DisplayMediaProvider>,
        recorders: Arc<dyn RecorderFactory>,
    ) -> CaptureResult<CaptureHandle> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::Runtime(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(CaptureSnapshot::default());
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let controller = Self {
            config,
            provider,
            recorders,
            state: CaptureState::Idle,
            session: Session::Closed,
            finalizing: HashMap::new(),
            artifact: None,
            error: None,
            disposed: false,
            mailbox: tx.downgrade(),
            snapshot_tx,
            event_tx: event_tx.clone(),
        };

        runtime.spawn(controller.run(rx));
        tracing::info!("Capture controller started");

        Ok(CaptureHandle::new(tx, snapshot_rx, event_tx))
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            self.handle(message);
            debug_assert!(self.session.consistent_with(self.state));
            if self.disposed {
                break;
            }
        }
        self.teardown();
    }

    fn handle(&mut self, message: Message) {
        tracing::trace!("Handling {} in {:?}", message.name(), self.state);
        match message {
            Message::RequestStart => self.request_permissions_and_start_recording(),
            Message::StartRecording => self.start_recording(),
            Message::StopRecording => self.stop_recording(),
            Message::Dispose => self.teardown(),
            Message::AccessSettled { session, result } => self.on_access_settled(session, result),
            Message::DataAvailable { session, chunk } => self.on_data_available(session, chunk),
            Message::RecorderStopped { session } => self.on_recorder_stopped(session),
        }
    }

    fn request_permissions_and_start_recording(&mut self) {
        if !self.state.accepts_start() {
            tracing::warn!("Ignoring start request while {:?}", self.state);
            return;
        }

        if !self.provider.is_available() {
            self.fail(CaptureError::CapabilityUnavailable);
            return;
        }

        let id = SessionId::new();
        self.session = Session::Requesting { id };
        self.state = CaptureState::RequestingAccess;
        self.error = None;

        tracing::info!("Requesting display media access for session {}", id);
        let _ = self.event_tx.send(CaptureEvent::RequestingAccess { session: id });
        self.publish();

        let provider = Arc::clone(&self.provider);
        let constraints = self.config.constraints;
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = provider.get_display_media(constraints).await;
            match mailbox.upgrade() {
                // A failed send drops the message, which releases the stream
                Some(tx) => {
                    let _ = tx.send(Message::AccessSettled {
                        session: id,
                        result,
                    });
                }
                None => {
                    tracing::debug!("Controller gone before access settled for session {}", id);
                }
            }
        });
    }

    fn on_access_settled(
        &mut self,
        session: SessionId,
        result: CaptureResult<MediaStream>,
    ) {
        let id = match &self.session {
            Session::Requesting { id } if *id == session => *id,
            _ => {
                tracing::warn!("Discarding access result for superseded session {}", session);
                if let Ok(stream) = result {
                    stream.release();
                }
                return;
            }
        };

        match result {
            Err(err) => {
                self.session = Session::Closed;
                let err = match err {
                    CaptureError::Acquisition(_) => err,
                    other => CaptureError::Acquisition(other.to_string()),
                };
                self.fail(err);
            }
            Ok(stream) if stream.audio_track_count() == 0 => {
                self.session = Session::Closed;
                stream.release();
                self.fail(CaptureError::NoAudioTrack);
            }
            Ok(stream) => {
                tracing::debug!("Access granted for session {}: {:?}", id, stream);
                self.session = Session::Granted { id, stream };
                self.start_recording();
            }
        }
    }

    fn start_recording(&mut self) {
        let (id, stream) = match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Granted { id, stream } => (id, stream),
            other => {
                self.session = other;
                tracing::debug!("start_recording ignored: no granted stream");
                return;
            }
        };

        let sink = RecorderSink::new(id, self.mailbox.clone());
        let recorder = self.recorders.create(&stream, sink).and_then(|mut recorder| {
            recorder.start()?;
            Ok(recorder)
        });

        match recorder {
            Ok(recorder) => {
                self.session = Session::Recording {
                    id,
                    stream,
                    recorder,
                    chunks: Vec::new(),
                };
                self.state = CaptureState::Recording;
                self.error = None;
                self.artifact = None;

                tracing::info!("Recording session {}", id);
                let _ = self.event_tx.send(CaptureEvent::Started { session: id });
                self.publish();
            }
            Err(err) => {
                stream.release();
                let err = match err {
                    CaptureError::Recorder(_) => err,
                    other => CaptureError::Recorder(other.to_string()),
                };
                self.fail(err);
            }
        }
    }

    fn stop_recording(&mut self) {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Recording {
                id,
                stream,
                mut recorder,
                chunks,
            } => {
                recorder.stop();
                self.finalizing.insert(id, chunks);
                stream.release();
                drop(recorder);

                self.state = CaptureState::Idle;
                tracing::info!("Stopped session {}, awaiting finalize", id);
                let _ = self.event_tx.send(CaptureEvent::Stopped { session: id });
                self.publish();
            }
            other => {
                self.session = other;
                tracing::debug!("stop_recording ignored: no active recorder");
            }
        }
    }

    fn on_data_available(&mut self, session: SessionId, chunk: Vec<u8>) {
        if let Session::Recording { id, chunks, .. } = &mut self.session {
            if *id == session {
                tracing::debug!("Received audio chunk: {} bytes", chunk.len());
                chunks.push(chunk);
                return;
            }
        }

        if let Some(chunks) = self.finalizing.get_mut(&session) {
            tracing::debug!("Received trailing audio chunk: {} bytes", chunk.len());
            chunks.push(chunk);
            return;
        }

        tracing::warn!("Dropping chunk from stale session {}", session);
    }

    fn on_recorder_stopped(&mut self, session: SessionId) {
        let chunks = match self.finalizing.remove(&session) {
            Some(chunks) => chunks,
            None if self.session.id() == Some(session) && self.session.has_recorder() => {
                // Recorder ended on its own (device lost); close the session
                match std::mem::replace(&mut self.session, Session::Closed) {
                    Session::Recording { stream, chunks, .. } => {
                        tracing::warn!("Recorder for session {} stopped unexpectedly", session);
                        stream.release();
                        self.state = CaptureState::Idle;
                        let _ = self.event_tx.send(CaptureEvent::Stopped { session });
                        chunks
                    }
                    other => {
                        self.session = other;
                        return;
                    }
                }
            }
            None => {
                tracing::debug!("Ignoring finalize for unknown session {}", session);
                return;
            }
        };

        let artifact = AudioArtifact::assemble(session, chunks, &self.config.artifact_mime_type);
        tracing::info!(
            "Artifact ready for session {}: {} bytes in {} chunks",
            session,
            artifact.byte_len,
            artifact.chunk_count
        );
        let _ = self.event_tx.send(CaptureEvent::ArtifactReady {
            session,
            bytes: artifact.byte_len,
        });
        self.artifact = Some(artifact);
        self.publish();
    }

    fn fail(&mut self, error: CaptureError) {
        tracing::error!("{}: {}", error.user_message(), error);
        let _ = self.event_tx.send(CaptureEvent::Error(ErrorResponse::from(&error)));
        self.state = CaptureState::Error;
        self.error = Some(error);
        self.publish();
    }

    /// Release everything held. Safe to call any number of times.
    fn teardown(&mut self) {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Recording {
                stream,
                mut recorder,
                ..
            } => {
                recorder.stop();
                stream.release();
            }
            Session::Granted { stream, .. } => stream.release(),
            Session::Requesting { .. } | Session::Closed => {}
        }
        self.finalizing.clear();

        if matches!(
            self.state,
            CaptureState::Recording | CaptureState::RequestingAccess
        ) {
            self.state = CaptureState::Idle;
        }

        if !self.disposed {
            self.disposed = true;
            tracing::info!("Capture controller disposed");
            let _ = self.event_tx.send(CaptureEvent::Disposed);
            self.publish();
        }
    }

    fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            state: self.state,
            audio_artifact: self.artifact.clone(),
            error_message: self.error.as_ref().map(CaptureError::user_message),
            error_code: self.error.as_ref().map(|e| e.code().to_string()),
            session: match self.state {
                CaptureState::RequestingAccess | CaptureState::Recording => self.session.id(),
                CaptureState::Idle | CaptureState::Error => None,
            },
        }
    }

    fn publish(&self) {
        debug_assert!(!self.session.has_recorder() || self.state == CaptureState::Recording);
        debug_assert!(self.state != CaptureState::Recording || self.session.holds_stream());
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.teardown();
    }
}
