//! Playback adapters

use std::sync::Arc;

use crate::Result;
use crate::session::{AudioOutput, AudioPayload, PlaybackSink};
use crate::voice::{AudioPlayback, PlaybackControl, PlaybackOutcome};

/// Plays reply audio through the default output device
///
/// Decoding and playback run on a blocking worker; `stop` flips the active
/// playback's control flag and the worker exits without reporting `ended`.
pub struct SpeakerOutput {
    playback: Arc<AudioPlayback>,
    current: Option<(PlaybackControl, PlaybackSink)>,
}

impl SpeakerOutput {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device exists
    pub fn new() -> Result<Self> {
        Ok(Self {
            playback: Arc::new(AudioPlayback::new()?),
            current: None,
        })
    }
}

impl AudioOutput for SpeakerOutput {
    fn play(&mut self, audio: AudioPayload, sink: PlaybackSink) -> Result<()> {
        self.stop();

        let control = PlaybackControl::new();
        let playback = Arc::clone(&self.playback);
        let worker_control = control.clone();
        let worker_sink = sink.clone();

        tokio::task::spawn_blocking(move || {
            worker_sink.play();
            match playback.play_mp3_blocking(audio.as_bytes(), &worker_control) {
                Ok(PlaybackOutcome::Finished) => worker_sink.ended(),
                Ok(PlaybackOutcome::Stopped) => {
                    tracing::debug!("playback stopped");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "playback failed");
                    worker_sink.ended();
                }
            }
        });

        self.current = Some((control, sink));
        Ok(())
    }

    fn pause(&mut self) {
        if let Some((control, sink)) = &self.current {
            control.pause();
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some((control, sink)) = &self.current {
            control.resume();
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some((control, _)) = self.current.take() {
            control.stop();
        }
    }
}

/// Text-only output: every reply "finishes" immediately
#[derive(Debug, Default)]
pub struct MutedOutput;

impl AudioOutput for MutedOutput {
    fn play(&mut self, audio: AudioPayload, sink: PlaybackSink) -> Result<()> {
        tracing::debug!(audio_bytes = audio.len(), "muted, skipping playback");
        sink.play();
        sink.ended();
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {}
}
