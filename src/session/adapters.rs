//! Contracts between the turn controller and its collaborators
//!
//! Capture and playback adapters receive a sink when a session is started.
//! The sink is bound to the generation of the command that started it, so
//! every event it emits can be matched against the controller's current
//! generation and discarded once stale.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::controller::{Generation, Input};
use crate::Result;

/// Playable audio owned by the controller while speaking
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AudioPayload(Arc<[u8]>);

impl AudioPayload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for AudioPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&[u8]> for AudioPayload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }
}

impl std::fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AudioPayload({} bytes)", self.0.len())
    }
}

/// Reply text and synthesized audio for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub audio: AudioPayload,
}

/// Events emitted by a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Started,
    Interim(String),
    Final(String),
    Error(String),
    Ended,
}

/// Events emitted by a playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Ended,
}

/// Generation-bound event sink handed to a capture adapter
#[derive(Debug, Clone)]
pub struct CaptureSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<Input>,
}

impl CaptureSink {
    #[must_use]
    pub const fn new(generation: Generation, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    pub fn started(&self) {
        self.emit(CaptureEvent::Started);
    }

    pub fn interim(&self, text: impl Into<String>) {
        self.emit(CaptureEvent::Interim(text.into()));
    }

    pub fn final_result(&self, text: impl Into<String>) {
        self.emit(CaptureEvent::Final(text.into()));
    }

    pub fn error(&self, reason: impl Into<String>) {
        self.emit(CaptureEvent::Error(reason.into()));
    }

    pub fn ended(&self) {
        self.emit(CaptureEvent::Ended);
    }

    /// Deliver an event; silently dropped once the session is gone
    pub fn emit(&self, event: CaptureEvent) {
        let _ = self.tx.send(Input::Capture {
            generation: self.generation,
            event,
        });
    }
}

/// Generation-bound event sink handed to a playback adapter
#[derive(Debug, Clone)]
pub struct PlaybackSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<Input>,
}

impl PlaybackSink {
    #[must_use]
    pub const fn new(generation: Generation, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    pub fn play(&self) {
        self.emit(PlaybackEvent::Play);
    }

    pub fn pause(&self) {
        self.emit(PlaybackEvent::Pause);
    }

    pub fn ended(&self) {
        self.emit(PlaybackEvent::Ended);
    }

    pub fn emit(&self, event: PlaybackEvent) {
        let _ = self.tx.send(Input::Playback {
            generation: self.generation,
            event,
        });
    }
}

/// Speech recognition source
///
/// `start` must emit exactly one `started` through the sink before any
/// result, error or `ended` event.
pub trait SpeechCapture {
    /// Begin a capture session
    ///
    /// # Errors
    ///
    /// Returns error if the capture device cannot be started
    fn start(&mut self, sink: CaptureSink) -> Result<()>;

    /// Stop the current capture session, if any
    fn stop(&mut self);
}

/// Sends a transcript to the backend and returns its reply
#[async_trait]
pub trait ReplyFetcher: Send + Sync {
    /// Fetch the reply for `text`
    ///
    /// # Errors
    ///
    /// Returns error on network or upstream failure
    async fn send(&self, text: &str) -> Result<Reply>;
}

/// Audio output device
pub trait AudioOutput {
    /// Start playing `audio`; `ended` is emitted when it finishes
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot be started
    fn play(&mut self, audio: AudioPayload, sink: PlaybackSink) -> Result<()>;

    /// Hold the current playback; emits `pause`
    fn pause(&mut self);

    /// Continue a held playback; emits `play`
    fn resume(&mut self);

    fn stop(&mut self);
}
