//! Capture trait definitions
//!
//! Platform-agnostic traits for the capabilities the capture controller
//! depends on: stream acquisition, tracks and recorders.

use crate::recorder::session::Message;
use crate::recorder::state::SessionId;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Constraints for a display media request
///
/// Video is requested alongside audio because display capture will not
/// hand out audio on its own, even though only audio is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayMediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for DisplayMediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// PCM layout of a tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Shared buffer of interleaved i16 samples a recorder drains from a track
#[derive(Clone)]
pub struct PcmTap {
    format: PcmFormat,
    buffer: Arc<Mutex<Vec<i16>>>,
}

impl PcmTap {
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn push(&self, samples: &[i16]) {
        self.buffer.lock().extend_from_slice(samples);
    }

    pub fn extend<I: IntoIterator<Item = i16>>(&self, samples: I) {
        self.buffer.lock().extend(samples);
    }

    /// Take everything buffered so far
    pub fn drain(&self) -> Vec<i16> {
        std::mem::take(&mut *self.buffer.lock())
    }
}

impl fmt::Debug for PcmTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmTap")
            .field("format", &self.format)
            .field("buffered", &self.buffer.lock().len())
            .finish()
    }
}

/// One track of a granted media stream
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    fn label(&self) -> &str;

    /// Stop producing media and release the underlying device
    fn stop(&self);

    /// Sample tap for recorders that consume raw PCM
    fn pcm_tap(&self) -> Option<PcmTap> {
        None
    }
}

/// A granted media stream
///
/// Owns its tracks. Every track is stopped exactly once when the stream is
/// released or dropped.
pub struct MediaStream {
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> impl Iterator<Item = &dyn MediaTrack> {
        self.tracks.iter().map(|t| t.as_ref())
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &dyn MediaTrack> {
        self.tracks().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &dyn MediaTrack> {
        self.tracks().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_track_count(&self) -> usize {
        self.audio_tracks().count()
    }

    pub fn video_track_count(&self) -> usize {
        self.video_tracks().count()
    }

    /// First PCM tap offered by an audio track
    pub fn pcm_tap(&self) -> Option<PcmTap> {
        self.audio_tracks().find_map(|t| t.pcm_tap())
    }

    /// Stop every track and give up the stream
    pub fn release(self) {
        tracing::debug!(
            "Releasing stream ({} audio, {} video tracks)",
            self.audio_track_count(),
            self.video_track_count()
        );
        drop(self);
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        for track in self.tracks.drain(..) {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("audio_tracks", &self.audio_track_count())
            .field("video_tracks", &self.video_track_count())
            .finish()
    }
}

/// Stream acquisition capability (the permission prompt plus device open)
#[async_trait]
pub trait DisplayMediaProvider: Send + Sync + 'static {
    /// Whether the capture request API exists in this environment
    fn is_available(&self) -> bool;

    /// Ask the user for access and open the granted stream
    async fn get_display_media(
        &self,
        constraints: DisplayMediaConstraints,
    ) -> CaptureResult<MediaStream>;
}

/// A running recorder bound to one stream
///
/// After `stop` the recorder may emit remaining data and must then call
/// [`RecorderSink::stopped`] exactly once.
pub trait MediaRecorder: Send {
    fn start(&mut self) -> CaptureResult<()>;

    fn stop(&mut self);
}

/// Creates recorders for granted streams
pub trait RecorderFactory: Send + Sync + 'static {
    fn create(
        &self,
        stream: &MediaStream,
        sink: RecorderSink,
    ) -> CaptureResult<Box<dyn MediaRecorder>>;
}

/// Callbacks a recorder reports through, tagged with its session
///
/// Holds only a weak reference to the controller mailbox; once the
/// controller is gone every report is silently discarded.
#[derive(Clone)]
pub struct RecorderSink {
    session: SessionId,
    mailbox: mpsc::WeakUnboundedSender<Message>,
}

impl RecorderSink {
    pub(crate) fn new(session: SessionId, mailbox: mpsc::WeakUnboundedSender<Message>) -> Self {
        Self { session, mailbox }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Whether the controller can still receive reports
    pub fn is_closed(&self) -> bool {
        self.mailbox.upgrade().is_none()
    }

    /// Chunk-received callback
    pub fn data(&self, chunk: Vec<u8>) {
        self.post(Message::DataAvailable {
            session: self.session,
            chunk,
        });
    }

    /// Finalize callback
    pub fn stopped(&self) {
        self.post(Message::RecorderStopped {
            session: self.session,
        });
    }

    fn post(&self, message: Message) {
        if let Some(tx) = self.mailbox.upgrade() {
            let _ = tx.send(message);
        }
    }
}

impl fmt::Debug for RecorderSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderSink")
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTrack {
        kind: TrackKind,
        stops: Arc<AtomicUsize>,
    }

    impl MediaTrack for CountingTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }

        fn label(&self) -> &str {
            "counting"
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stream_with(kinds: &[TrackKind], stops: &Arc<AtomicUsize>) -> MediaStream {
        MediaStream::new(
            kinds
                .iter()
                .map(|&kind| {
                    Box::new(CountingTrack {
                        kind,
                        stops: Arc::clone(stops),
                    }) as Box<dyn MediaTrack>
                })
                .collect(),
        )
    }

    #[test]
    fn test_track_counts() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = stream_with(&[TrackKind::Video, TrackKind::Audio, TrackKind::Audio], &stops);
        assert_eq!(stream.audio_track_count(), 2);
        assert_eq!(stream.video_track_count(), 1);
        assert!(stream.pcm_tap().is_none());
    }

    #[test]
    fn test_release_stops_each_track_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stream = stream_with(&[TrackKind::Video, TrackKind::Audio], &stops);
        stream.release();
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_stops_tracks() {
        let stops = Arc::new(AtomicUsize::new(0));
        drop(stream_with(&[TrackKind::Video], &stops));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pcm_tap_drain() {
        let tap = PcmTap::new(PcmFormat {
            sample_rate: 48000,
            channels: 2,
        });
        tap.push(&[1, 2]);
        tap.extend([3, 4]);
        assert_eq!(tap.drain(), vec![1, 2, 3, 4]);
        assert!(tap.drain().is_empty());
    }

    #[test]
    fn test_sink_discards_after_controller_gone() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = RecorderSink::new(SessionId::new(), tx.downgrade());
        sink.data(vec![1]);
        assert!(matches!(rx.try_recv(), Ok(Message::DataAvailable { .. })));

        drop(tx);
        assert!(sink.is_closed());
        sink.stopped();
        assert!(rx.try_recv().is_err());
    }
}
