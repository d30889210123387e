//! Microphone capture adapter
//!
//! Records from the default input device, waits for one utterance using the
//! energy detector, then transcribes it with the configured STT provider.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::Result;
use crate::session::{CaptureSink, SpeechCapture};
use crate::voice::{
    AudioCapture, DetectorEvent, SAMPLE_RATE, SampleBuffer, Transcriber, UtteranceDetector,
    samples_to_wav,
};

/// Interval between buffer drains
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hard cap on one capture session, whatever the detector is doing
pub const MAX_LISTEN: Duration = Duration::from_secs(30);

/// Time limits for one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenLimits {
    /// Give up when no speech has started by then
    pub no_speech: Duration,
    /// Give up unconditionally
    pub max_listen: Duration,
}

/// Capture adapter backed by a microphone and a speech-to-text API
pub struct MicCapture {
    audio: AudioCapture,
    stt: Arc<dyn Transcriber>,
    limits: ListenLimits,
    task: Option<JoinHandle<()>>,
}

impl MicCapture {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device exists
    pub fn new(stt: Arc<dyn Transcriber>, listen_timeout: Duration) -> Result<Self> {
        Ok(Self {
            audio: AudioCapture::new()?,
            stt,
            limits: ListenLimits {
                no_speech: listen_timeout,
                max_listen: MAX_LISTEN.max(listen_timeout),
            },
            task: None,
        })
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl SpeechCapture for MicCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        self.abort_task();
        self.audio.start()?;
        sink.started();

        let buffer = self.audio.buffer();
        let stt = Arc::clone(&self.stt);
        let limits = self.limits;
        self.task = Some(tokio::spawn(async move {
            listen_once(buffer, stt, limits, sink).await;
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.abort_task();
        self.audio.stop();
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Wait for one utterance and report it through `sink`
pub async fn listen_once(
    buffer: SampleBuffer,
    stt: Arc<dyn Transcriber>,
    limits: ListenLimits,
    sink: CaptureSink,
) {
    let mut detector = UtteranceDetector::new();
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let started = tokio::time::Instant::now();

    let utterance = loop {
        interval.tick().await;

        let samples = buffer.take();
        match detector.process(&samples) {
            DetectorEvent::UtteranceComplete => break detector.take_utterance(),
            DetectorEvent::SpeechStarted => sink.interim("..."),
            DetectorEvent::Discarded | DetectorEvent::None => {}
        }

        let elapsed = started.elapsed();
        if !detector.is_listening() && elapsed >= limits.no_speech {
            tracing::debug!("no speech before listen timeout");
            sink.error("no-speech");
            return;
        }
        if elapsed >= limits.max_listen {
            tracing::debug!(samples = detector.speech_buffer().len(), "listen time exhausted");
            sink.error("speech-timeout");
            return;
        }
    };

    let wav = match samples_to_wav(&utterance, SAMPLE_RATE) {
        Ok(wav) => wav,
        Err(e) => {
            sink.error(format!("audio-capture: {e}"));
            return;
        }
    };

    match stt.transcribe(&wav).await {
        Ok(text) if text.trim().is_empty() => sink.ended(),
        Ok(text) => sink.final_result(text),
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed");
            sink.error(format!("network: {e}"));
        }
    }
}
