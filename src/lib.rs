//! Desktop audio capture.
//!
//! A small state machine that requests display-media access, records the
//! granted audio track into chunks and assembles them into one artifact per
//! session, releasing every acquired resource on each exit path.

pub mod capture;
pub mod recorder;
pub mod utils;

use std::sync::Arc;

pub use capture::{CpalDisplayMedia, PcmChunkRecorderFactory};
pub use recorder::{
    AudioArtifact, CaptureConfig, CaptureController, CaptureEvent, CaptureHandle,
    CaptureSnapshot, CaptureState,
};
pub use utils::error::{CaptureError, CaptureResult};

/// Initialize tracing/logging
///
/// Honors `RUST_LOG`; defaults to debug output for this crate. Calling it
/// again after a subscriber is installed is a no-op.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "desktop_audio_capture=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Spawn a controller capturing desktop audio through the default cpal host
pub fn spawn_desktop_capture(config: CaptureConfig) -> CaptureResult<CaptureHandle> {
    tracing::info!("Starting desktop audio capture v{}", env!("CARGO_PKG_VERSION"));
    let recorders = PcmChunkRecorderFactory::from_config(&config);
    CaptureController::spawn(config, Arc::new(CpalDisplayMedia::new()), Arc::new(recorders))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let result = spawn_desktop_capture(CaptureConfig::default());
        assert!(matches!(result, Err(CaptureError::Runtime(_))));
    }
}
