//! Session record and controller mailbox messages

use super::state::{CaptureState, SessionId};
use crate::capture::traits::{MediaRecorder, MediaStream};
use crate::utils::error::CaptureResult;

/// Everything delivered to the controller's reducer
pub(crate) enum Message {
    /// UI intent: ask for access and record
    RequestStart,
    /// UI intent: start recording on an already granted stream
    StartRecording,
    /// UI intent: stop the active recorder
    StopRecording,
    /// UI teardown
    Dispose,
    /// Permission prompt settled
    AccessSettled {
        session: SessionId,
        result: CaptureResult<MediaStream>,
    },
    /// Recorder emitted a chunk
    DataAvailable { session: SessionId, chunk: Vec<u8> },
    /// Recorder finished stopping
    RecorderStopped { session: SessionId },
}

impl Message {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Message::RequestStart => "request_start",
            Message::StartRecording => "start_recording",
            Message::StopRecording => "stop_recording",
            Message::Dispose => "dispose",
            Message::AccessSettled { .. } => "access_settled",
            Message::DataAvailable { .. } => "data_available",
            Message::RecorderStopped { .. } => "recorder_stopped",
        }
    }
}

/// Session-scoped resources, replaced wholesale on every transition
pub(crate) enum Session {
    /// No session open
    Closed,
    /// Permission request in flight
    Requesting { id: SessionId },
    /// Stream granted, recorder not yet running
    Granted { id: SessionId, stream: MediaStream },
    /// Recorder running on the stream
    Recording {
        id: SessionId,
        stream: MediaStream,
        recorder: Box<dyn MediaRecorder>,
        chunks: Vec<Vec<u8>>,
    },
}

impl Session {
    pub(crate) fn id(&self) -> Option<SessionId> {
        match self {
            Session::Closed => None,
            Session::Requesting { id }
            | Session::Granted { id, .. }
            | Session::Recording { id, .. } => Some(*id),
        }
    }

    pub(crate) fn holds_stream(&self) -> bool {
        matches!(self, Session::Granted { .. } | Session::Recording { .. })
    }

    pub(crate) fn has_recorder(&self) -> bool {
        matches!(self, Session::Recording { .. })
    }

    /// Whether the record agrees with the observable state
    pub(crate) fn consistent_with(&self, state: CaptureState) -> bool {
        match self {
            Session::Closed => matches!(state, CaptureState::Idle | CaptureState::Error),
            Session::Requesting { .. } => state == CaptureState::RequestingAccess,
            // Transient inside a single reducer step
            Session::Granted { .. } => state == CaptureState::RequestingAccess,
            Session::Recording { .. } => state == CaptureState::Recording,
        }
    }
}
