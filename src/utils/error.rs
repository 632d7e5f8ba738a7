//! Error types and handling
//!
//! Common error types used across the capture controller and its capabilities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when the capture request API is missing from the environment
pub const MSG_CAPABILITY_UNAVAILABLE: &str =
    "Desktop audio capture is not supported in this environment";

/// Message shown when access was granted without any audio track
pub const MSG_NO_AUDIO_TRACK: &str =
    "Audio recording permission denied or no audio track available";

/// Message shown when the access request (or recorder startup) failed
pub const MSG_ACQUISITION_FAILED: &str = "Error starting desktop audio capture";

/// Capture-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture capability unavailable")]
    CapabilityUnavailable,

    #[error("No audio track in granted stream")]
    NoAudioTrack,

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    #[error("Capture controller has been disposed")]
    ControllerClosed,
}

impl CaptureError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::CapabilityUnavailable => "CAPABILITY_UNAVAILABLE",
            CaptureError::NoAudioTrack => "NO_AUDIO_TRACK",
            CaptureError::Acquisition(_) => "ACQUISITION_FAILED",
            CaptureError::Recorder(_) => "RECORDER_FAILED",
            CaptureError::Config(_) => "CONFIG_ERROR",
            CaptureError::Runtime(_) => "RUNTIME_UNAVAILABLE",
            CaptureError::ControllerClosed => "CONTROLLER_CLOSED",
        }
    }

    /// Human-readable message surfaced through the snapshot.
    ///
    /// Acquisition and recorder failures share one message; the detail only
    /// goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::CapabilityUnavailable => MSG_CAPABILITY_UNAVAILABLE.to_string(),
            CaptureError::NoAudioTrack => MSG_NO_AUDIO_TRACK.to_string(),
            CaptureError::Acquisition(_) | CaptureError::Recorder(_) => {
                MSG_ACQUISITION_FAILED.to_string()
            }
            CaptureError::Config(_) | CaptureError::Runtime(_) | CaptureError::ControllerClosed => {
                self.to_string()
            }
        }
    }
}

/// Error as exposed to observers of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.user_message(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CaptureError::NoAudioTrack.user_message(),
            "Audio recording permission denied or no audio track available"
        );
        assert_eq!(
            CaptureError::Acquisition("NotAllowedError".into()).user_message(),
            "Error starting desktop audio capture"
        );
        assert_eq!(
            CaptureError::Recorder("boom".into()).user_message(),
            MSG_ACQUISITION_FAILED
        );
    }

    #[test]
    fn test_error_response_from_error() {
        let response = ErrorResponse::from(&CaptureError::CapabilityUnavailable);
        assert_eq!(response.code, "CAPABILITY_UNAVAILABLE");
        assert_eq!(response.message, MSG_CAPABILITY_UNAVAILABLE);
    }
}
