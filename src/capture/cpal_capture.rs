//! Desktop audio capture using cpal
//!
//! On Windows the default output device is opened in WASAPI loopback mode,
//! which captures the audio being played to it. Elsewhere the default input
//! device is used (e.g. a PulseAudio/PipeWire monitor source).

use super::traits::{
    DisplayMediaConstraints, DisplayMediaProvider, MediaStream, MediaTrack, PcmFormat, PcmTap,
    TrackKind,
};
use super::wav::{f32_to_i16, u16_to_i16};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig, SupportedStreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;

/// Get the device desktop audio is captured from
fn default_capture_device() -> Option<Device> {
    let host = cpal::default_host();

    #[cfg(target_os = "windows")]
    {
        host.default_output_device()
    }

    #[cfg(not(target_os = "windows"))]
    {
        host.default_input_device()
    }
}

fn default_capture_config(device: &Device) -> CaptureResult<SupportedStreamConfig> {
    #[cfg(target_os = "windows")]
    let config = device.default_output_config();

    #[cfg(not(target_os = "windows"))]
    let config = device.default_input_config();

    config.map_err(|e| CaptureError::Acquisition(format!("Failed to get audio config: {}", e)))
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!("Desktop audio stream error: {}", err);
}

/// Open the capture stream and start it, feeding samples into a new tap
fn build_capture_stream() -> CaptureResult<(cpal::Stream, String, PcmTap)> {
    let device = default_capture_device()
        .ok_or_else(|| CaptureError::Acquisition("No desktop audio device".to_string()))?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = default_capture_config(&device)?;
    let format = PcmFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    let config: StreamConfig = supported.config();
    let tap = PcmTap::new(format);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    tap.extend(data.iter().map(|&s| f32_to_i16(s)));
                },
                log_stream_error,
                None,
            )
        }
        SampleFormat::I16 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| tap.push(data),
                log_stream_error,
                None,
            )
        }
        SampleFormat::U16 => {
            let tap = tap.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    tap.extend(data.iter().map(|&s| u16_to_i16(s)));
                },
                log_stream_error,
                None,
            )
        }
        other => {
            return Err(CaptureError::Acquisition(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::Acquisition(format!("Failed to build audio stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| CaptureError::Acquisition(format!("Failed to start audio stream: {}", e)))?;

    tracing::info!(
        "Desktop audio stream opened: {} ({}Hz, {}ch)",
        device_name,
        format.sample_rate,
        format.channels
    );
    Ok((stream, device_name, tap))
}

/// Audio track backed by a cpal input stream
///
/// `cpal::Stream` is not `Send`, so the stream lives on its own thread and
/// is dropped there when the track stops.
pub struct CpalAudioTrack {
    label: String,
    tap: PcmTap,
    stopped: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalAudioTrack {
    /// Open the default capture device. Blocks until the stream is running.
    pub fn open() -> CaptureResult<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let thread_stopped = Arc::clone(&stopped);

        let thread = std::thread::Builder::new()
            .name("desktop-audio-capture".to_string())
            .spawn(move || {
                let stream = match build_capture_stream() {
                    Ok((stream, label, tap)) => {
                        let _ = ready_tx.send(Ok((label, tap)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !thread_stopped.load(Ordering::SeqCst) {
                    std::thread::park();
                }
                drop(stream);
                tracing::debug!("Desktop audio stream closed");
            })
            .map_err(|e| {
                CaptureError::Acquisition(format!("Failed to spawn capture thread: {}", e))
            })?;

        let (label, tap) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(CaptureError::Acquisition(
                    "Capture thread exited before opening the stream".to_string(),
                ));
            }
        };

        Ok(Self {
            label,
            tap,
            stopped,
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl MediaTrack for CpalAudioTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("Desktop audio capture thread panicked");
            }
        }
    }

    fn pcm_tap(&self) -> Option<PcmTap> {
        Some(self.tap.clone())
    }
}

impl Drop for CpalAudioTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Display media provider over the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDisplayMedia;

impl CpalDisplayMedia {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DisplayMediaProvider for CpalDisplayMedia {
    fn is_available(&self) -> bool {
        let available = default_capture_device().is_some();
        if !available {
            tracing::warn!("No device found for desktop audio capture");
        }
        available
    }

    async fn get_display_media(
        &self,
        constraints: DisplayMediaConstraints,
    ) -> CaptureResult<MediaStream> {
        // No video source here; the video constraint is accepted and yields no track
        if !constraints.audio {
            return Ok(MediaStream::new(Vec::new()));
        }

        let track = tokio::task::spawn_blocking(CpalAudioTrack::open)
            .await
            .map_err(|e| CaptureError::Acquisition(format!("Capture task failed: {}", e)))??;

        Ok(MediaStream::new(vec![Box::new(track)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_audio_not_requested_yields_no_tracks() {
        let provider = CpalDisplayMedia::new();
        let stream = provider
            .get_display_media(DisplayMediaConstraints {
                audio: false,
                video: true,
            })
            .await
            .unwrap();

        assert_eq!(stream.audio_track_count(), 0);
        assert_eq!(stream.video_track_count(), 0);
    }
}
