//! Capture state management
//!
//! Defines the capture state machine states, session identity, the finalized
//! audio artifact and the snapshot handed to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Current state of the capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No session open
    #[default]
    Idle,
    /// Waiting for the user to settle the permission prompt
    RequestingAccess,
    /// Recorder running, chunks accumulating
    Recording,
    /// Last session failed; a new request may be issued
    Error,
}

impl CaptureState {
    /// Whether a new permission request is accepted from this state
    pub fn accepts_start(&self) -> bool {
        matches!(self, CaptureState::Idle | CaptureState::Error)
    }
}

/// Identity of one request→record→stop cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Finalized audio produced once per completed session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioArtifact {
    /// Session that produced the artifact
    pub session: SessionId,

    /// Container MIME type (e.g. "audio/wav")
    pub mime_type: String,

    /// Number of chunks the artifact was assembled from
    pub chunk_count: usize,

    /// Total size in bytes
    pub byte_len: usize,

    /// When the recorder reported completion
    pub finalized_at: DateTime<Utc>,

    #[serde(skip)]
    data: Arc<[u8]>,
}

impl AudioArtifact {
    /// Concatenate `chunks` in order into a single artifact
    pub fn assemble(session: SessionId, chunks: Vec<Vec<u8>>, mime_type: &str) -> Self {
        let chunk_count = chunks.len();
        let data: Vec<u8> = chunks.concat();
        Self {
            session,
            mime_type: mime_type.to_string(),
            chunk_count,
            byte_len: data.len(),
            finalized_at: Utc::now(),
            data: Arc::from(data),
        }
    }

    /// Raw artifact bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the artifact bytes
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read-only view of the controller handed to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub audio_artifact: Option<AudioArtifact>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    /// Session currently requesting or recording
    pub session: Option<SessionId>,
}

impl CaptureSnapshot {
    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }
}
