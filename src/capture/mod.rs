//! Capture capabilities
//!
//! Platform-agnostic capability traits plus the cpal-backed desktop audio
//! implementation and its chunked WAV recorder.

pub mod cpal_capture;
pub mod pcm_recorder;
pub mod traits;
pub mod wav;

pub use cpal_capture::{CpalAudioTrack, CpalDisplayMedia};
pub use pcm_recorder::{PcmChunkRecorder, PcmChunkRecorderFactory};
pub use traits::{
    DisplayMediaConstraints, DisplayMediaProvider, MediaRecorder, MediaStream, MediaTrack,
    PcmFormat, PcmTap, RecorderFactory, RecorderSink, TrackKind,
};
