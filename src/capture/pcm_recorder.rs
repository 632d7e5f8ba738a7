//! Chunked WAV recorder over a PCM tap
//!
//! Emits a streaming WAV header as the first chunk, then one chunk of
//! 16-bit PCM per timeslice. Stopping flushes the remaining samples before
//! the finalize callback fires.

use super::traits::{MediaRecorder, MediaStream, PcmTap, RecorderFactory, RecorderSink};
use super::wav::{encode_samples, streaming_wav_header};
use crate::recorder::config::CaptureConfig;
use crate::utils::error::{CaptureError, CaptureResult};
use std::time::Duration;
use tokio::sync::oneshot;

/// Creates [`PcmChunkRecorder`]s for streams that expose a PCM tap
#[derive(Debug, Clone, Copy)]
pub struct PcmChunkRecorderFactory {
    timeslice: Duration,
}

impl PcmChunkRecorderFactory {
    pub fn new(timeslice: Duration) -> Self {
        Self { timeslice }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.timeslice())
    }
}

impl RecorderFactory for PcmChunkRecorderFactory {
    fn create(
        &self,
        stream: &MediaStream,
        sink: RecorderSink,
    ) -> CaptureResult<Box<dyn MediaRecorder>> {
        let tap = stream.pcm_tap().ok_or_else(|| {
            CaptureError::Recorder("Stream has no PCM audio track".to_string())
        })?;
        Ok(Box::new(PcmChunkRecorder::new(tap, sink, self.timeslice)))
    }
}

/// Recorder that slices a PCM tap into WAV chunks
pub struct PcmChunkRecorder {
    tap: PcmTap,
    sink: RecorderSink,
    timeslice: Duration,
    stop_tx: Option<oneshot::Sender<()>>,
    started: bool,
}

impl PcmChunkRecorder {
    pub fn new(tap: PcmTap, sink: RecorderSink, timeslice: Duration) -> Self {
        Self {
            tap,
            sink,
            timeslice,
            stop_tx: None,
            started: false,
        }
    }
}

impl MediaRecorder for PcmChunkRecorder {
    fn start(&mut self) -> CaptureResult<()> {
        if self.started {
            return Err(CaptureError::Recorder("Recorder already started".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::Runtime(e.to_string()))?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let tap = self.tap.clone();
        let sink = self.sink.clone();
        let timeslice = self.timeslice;

        runtime.spawn(async move {
            sink.data(streaming_wav_header(tap.format()));

            let mut ticker = tokio::time::interval(timeslice);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let samples = tap.drain();
                        if !samples.is_empty() {
                            sink.data(encode_samples(&samples));
                        }
                    }
                    // Fires on stop() and when the recorder is dropped
                    _ = &mut stop_rx => break,
                }
            }

            let remaining = tap.drain();
            if !remaining.is_empty() {
                sink.data(encode_samples(&remaining));
            }
            tracing::debug!("PCM recorder for session {} finished", sink.session());
            sink.stopped();
        });

        self.stop_tx = Some(stop_tx);
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::PcmFormat;
    use crate::capture::wav::WAV_HEADER_LEN;
    use crate::recorder::session::Message;
    use crate::recorder::state::SessionId;
    use tokio::sync::mpsc;

    fn tap() -> PcmTap {
        PcmTap::new(PcmFormat {
            sample_rate: 8000,
            channels: 1,
        })
    }

    async fn collect_until_stopped(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(Message::DataAvailable { chunk, .. })) => chunks.push(chunk),
                Ok(Some(Message::RecorderStopped { .. })) => return chunks,
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => panic!("recorder never reported completion"),
            }
        }
    }

    #[tokio::test]
    async fn test_header_then_samples_then_finalize() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tap = tap();
        let sink = RecorderSink::new(SessionId::new(), tx.downgrade());
        let mut recorder = PcmChunkRecorder::new(tap.clone(), sink, Duration::from_millis(10));

        recorder.start().unwrap();
        tap.push(&[1, 2, 3]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tap.push(&[4]);
        recorder.stop();

        let chunks = collect_until_stopped(&mut rx).await;
        assert_eq!(chunks[0].len(), WAV_HEADER_LEN);
        let pcm: Vec<u8> = chunks[1..].concat();
        assert_eq!(pcm, encode_samples(&[1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_drop_finalizes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = RecorderSink::new(SessionId::new(), tx.downgrade());
        let mut recorder = PcmChunkRecorder::new(tap(), sink, Duration::from_millis(10));

        recorder.start().unwrap();
        drop(recorder);

        let chunks = collect_until_stopped(&mut rx).await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = RecorderSink::new(SessionId::new(), tx.downgrade());
        let mut recorder = PcmChunkRecorder::new(tap(), sink, Duration::from_millis(10));

        recorder.start().unwrap();
        assert!(matches!(recorder.start(), Err(CaptureError::Recorder(_))));
        recorder.stop();
    }

    #[test]
    fn test_factory_requires_pcm_tap() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = RecorderSink::new(SessionId::new(), tx.downgrade());
        let factory = PcmChunkRecorderFactory::new(Duration::from_millis(10));

        let result = factory.create(&MediaStream::new(Vec::new()), sink);
        assert!(matches!(result, Err(CaptureError::Recorder(_))));
    }
}
