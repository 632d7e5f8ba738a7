//! Capture session module
//!
//! This module implements the capture session state machine:
//! - CaptureController reducing intents and capability callbacks
//! - CaptureHandle exposing intents and snapshots to the UI
//! - Capture state, artifact and configuration types

pub mod config;
pub mod controller;
pub mod handle;
pub(crate) mod session;
pub mod state;

pub use config::CaptureConfig;
pub use controller::{CaptureController, CaptureEvent};
pub use handle::CaptureHandle;
pub use state::{AudioArtifact, CaptureSnapshot, CaptureState, SessionId};
