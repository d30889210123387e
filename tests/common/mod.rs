//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use voicebot::api::{ApiServer, ApiServerBuilder};
use voicebot::session::{
    AudioOutput, AudioPayload, CaptureSink, PlaybackSink, Reply, ReplyFetcher, SessionSnapshot,
    SpeechCapture,
};
use voicebot::{ChatModel, Error, Result, Synthesizer};

/// Language model that answers from a fixed table
#[derive(Default)]
pub struct MockChatModel {
    replies: HashMap<String, String>,
    fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl MockChatModel {
    pub fn with_reply(text: &str, reply: &str) -> Self {
        let mut model = Self::default();
        model.replies.insert(text.to_string(), reply.to_string());
        model
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, text: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::Llm("upstream unavailable".to_string()));
        }
        Ok(self
            .replies
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("echo: {text}")))
    }
}

/// Synthesizer that returns fixed bytes
pub struct MockSynthesizer {
    audio: Option<Vec<u8>>,
}

impl MockSynthesizer {
    pub fn returning(audio: &[u8]) -> Self {
        Self {
            audio: Some(audio.to_vec()),
        }
    }

    pub fn failing() -> Self {
        Self { audio: None }
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.audio
            .clone()
            .ok_or_else(|| Error::Tts("synthesis failed".to_string()))
    }
}

/// Build a relay server around mock upstreams
pub fn test_server(llm: MockChatModel, tts: MockSynthesizer) -> ApiServer {
    ApiServerBuilder::new(Arc::new(llm), Arc::new(tts), 0).build()
}

/// Reply fetcher with scripted outcomes and an optional delay
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: HashMap<String, std::result::Result<Reply, String>>,
    delay: Duration,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reply(mut self, text: &str, reply: &str, audio: &[u8]) -> Self {
        self.replies.insert(
            text.to_string(),
            Ok(Reply {
                text: reply.to_string(),
                audio: AudioPayload::from(audio),
            }),
        );
        self
    }

    #[must_use]
    pub fn reject(mut self, text: &str, reason: &str) -> Self {
        self.replies.insert(text.to_string(), Err(reason.to_string()));
        self
    }

    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared log of every text sent
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ReplyFetcher for ScriptedFetcher {
    async fn send(&self, text: &str) -> Result<Reply> {
        self.sent.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.replies.get(text) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(reason)) => Err(Error::Reply(reason.clone())),
            None => Err(Error::Reply(format!("no scripted reply for {text:?}"))),
        }
    }
}

#[derive(Default)]
struct CaptureState {
    sinks: Vec<CaptureSink>,
    starts: usize,
    stops: usize,
    failing_starts: usize,
}

/// Capture adapter driven by the test through the sinks it was given
#[derive(Clone, Default)]
pub struct MockCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` starts fail
    pub fn fail_next_starts(&self, n: usize) {
        self.state.lock().unwrap().failing_starts = n;
    }

    /// Sink of the most recent successful start
    pub fn sink(&self) -> CaptureSink {
        self.state
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("capture was never started")
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }
}

impl SpeechCapture for MockCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.starts += 1;
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(Error::Audio("device busy".to_string()));
        }
        sink.started();
        state.sinks.push(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().stops += 1;
    }
}

#[derive(Default)]
struct OutputState {
    played: Vec<AudioPayload>,
    sinks: Vec<PlaybackSink>,
    pauses: usize,
    resumes: usize,
    stops: usize,
}

/// Playback adapter that never finishes on its own
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<OutputState>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> PlaybackSink {
        self.state
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("nothing was played")
    }

    pub fn played(&self) -> Vec<AudioPayload> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn pauses(&self) -> usize {
        self.state.lock().unwrap().pauses
    }

    pub fn resumes(&self) -> usize {
        self.state.lock().unwrap().resumes
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }
}

impl AudioOutput for MockOutput {
    fn play(&mut self, audio: AudioPayload, sink: PlaybackSink) -> Result<()> {
        sink.play();
        let mut state = self.state.lock().unwrap();
        state.played.push(audio);
        state.sinks.push(sink);
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.pauses += 1;
        if let Some(sink) = state.sinks.last() {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.resumes += 1;
        if let Some(sink) = state.sinks.last() {
            sink.play();
        }
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().stops += 1;
    }
}

/// Wait until a published snapshot satisfies `predicate`
///
/// Panics after 60 seconds of (possibly paused) time.
pub async fn wait_for<F>(snapshots: &mut watch::Receiver<SessionSnapshot>, predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(60), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session driver stopped")
        .clone()
}
