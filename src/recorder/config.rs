//! Capture configuration

use crate::capture::traits::DisplayMediaConstraints;
use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the capture controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Constraints passed to the display media request
    pub constraints: DisplayMediaConstraints,

    /// MIME type stamped on assembled artifacts
    pub artifact_mime_type: String,

    /// Interval at which the PCM recorder emits chunks
    pub timeslice_ms: u64,

    /// Capacity of the lifecycle event broadcast channel
    pub event_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            constraints: DisplayMediaConstraints::default(),
            artifact_mime_type: "audio/wav".to_string(),
            timeslice_ms: 250,
            event_capacity: 100,
        }
    }
}

impl CaptureConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        let config: CaptureConfig =
            serde_json::from_str(json).map_err(|e| CaptureError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.timeslice_ms == 0 {
            return Err(CaptureError::Config("timesliceMs must be greater than zero".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(CaptureError::Config("eventCapacity must be greater than zero".to_string()));
        }
        if self.artifact_mime_type.trim().is_empty() {
            return Err(CaptureError::Config("artifactMimeType must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requests_audio_and_video() {
        let config = CaptureConfig::default();
        assert!(config.constraints.audio);
        assert!(config.constraints.video);
        assert_eq!(config.artifact_mime_type, "audio/wav");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CaptureConfig::from_json_str(r#"{ "timesliceMs": 100 }"#).unwrap();
        assert_eq!(config.timeslice(), Duration::from_millis(100));
        assert_eq!(config.event_capacity, 100);
        assert!(config.constraints.audio);
    }

    #[test]
    fn test_rejects_zero_timeslice() {
        let err = CaptureConfig::from_json_str(r#"{ "timesliceMs": 0 }"#).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = CaptureConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_mime_type() {
        let config = CaptureConfig {
            artifact_mime_type: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
