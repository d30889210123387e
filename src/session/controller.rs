//! Conversational turn controller
//!
//! A synchronous state machine: every [`Input`] produces a list of
//! [`Effect`]s for the driver to execute. The controller never performs I/O
//! and never waits, which keeps every transition testable without a runtime.

use std::time::Duration;

use serde::Serialize;

use super::adapters::{AudioPayload, CaptureEvent, PlaybackEvent, Reply};
use super::history::{History, Turn};
use super::phase::Phase;

/// Reply shown when the backend could not produce one
pub const FALLBACK_REPLY: &str = "Sorry, there was an error processing your request.";

/// Token identifying the currently live asynchronous resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Delays before capture resumes after each kind of cycle end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTiming {
    /// After a recognition error or a capture that ended without a result
    pub recognition_retry: Duration,
    /// After a failed reply request
    pub reply_failure_resume: Duration,
    /// After reply playback ends, so the mic doesn't pick up trailing audio
    pub playback_resume: Duration,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self {
            recognition_retry: Duration::from_secs(2),
            reply_failure_resume: Duration::from_secs(2),
            playback_resume: Duration::from_secs(1),
        }
    }
}

/// Everything the controller reacts to
#[derive(Debug, Clone)]
pub enum Input {
    /// Manual start
    Start,
    /// Manual stop
    Stop,
    /// Clear history, cancel everything and start listening again
    Reset,
    /// Hold reply playback
    PausePlayback,
    /// Continue held reply playback
    ResumePlayback,
    Capture {
        generation: Generation,
        event: CaptureEvent,
    },
    Reply {
        generation: Generation,
        result: std::result::Result<Reply, String>,
    },
    Playback {
        generation: Generation,
        event: PlaybackEvent,
    },
    /// A scheduled resume came due
    Resume { generation: Generation },
}

/// Commands for the driver to carry out against the adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartCapture { generation: Generation },
    StopCapture,
    SendReply { generation: Generation, text: String },
    CancelReply,
    Play { generation: Generation, audio: AudioPayload },
    PausePlayback,
    ResumePlayback,
    StopPlayback,
    ScheduleResume { generation: Generation, after: Duration },
    CancelResume,
}

/// Point-in-time view of the session for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub generation: Generation,
    pub transcript: String,
    pub last_reply: Option<String>,
    pub notice: Option<String>,
    pub resume_pending: bool,
    pub history: Vec<Turn>,
}

/// Drives one conversational cycle at a time
#[derive(Debug)]
pub struct TurnController {
    timing: TurnTiming,
    phase: Phase,
    generation: Generation,
    current_transcript: String,
    /// Text sent with the in-flight reply request
    pending_utterance: Option<String>,
    /// Audio owned while speaking
    pending_audio: Option<AudioPayload>,
    resume_pending: bool,
    last_reply: Option<String>,
    notice: Option<String>,
    history: History,
}

impl TurnController {
    #[must_use]
    pub fn new(timing: TurnTiming) -> Self {
        Self {
            timing,
            phase: Phase::Idle,
            generation: Generation::default(),
            current_transcript: String::new(),
            pending_utterance: None,
            pending_audio: None,
            resume_pending: false,
            last_reply: None,
            notice: None,
            history: History::new(),
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn current_transcript(&self) -> &str {
        &self.current_transcript
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub const fn pending_audio(&self) -> Option<&AudioPayload> {
        self.pending_audio.as_ref()
    }

    #[must_use]
    pub const fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    #[must_use]
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            generation: self.generation,
            transcript: self.current_transcript.clone(),
            last_reply: self.last_reply.clone(),
            notice: self.notice.clone(),
            resume_pending: self.resume_pending,
            history: self.history.turns().to_vec(),
        }
    }

    /// Process one input and return the effects it requires
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Start => self.start(),
            Input::Stop => self.stop(),
            Input::Reset => self.reset(),
            Input::PausePlayback | Input::ResumePlayback if self.phase != Phase::Speaking => {
                tracing::debug!(phase = ?self.phase, "nothing is playing");
                Vec::new()
            }
            Input::PausePlayback => vec![Effect::PausePlayback],
            Input::ResumePlayback => vec![Effect::ResumePlayback],
            Input::Capture { generation, event } => {
                if self.is_stale(generation) {
                    tracing::trace!(?event, generation = generation.get(), "stale capture event");
                    return Vec::new();
                }
                self.on_capture(event)
            }
            Input::Reply { generation, result } => {
                if self.is_stale(generation) {
                    tracing::debug!(generation = generation.get(), "discarding stale reply");
                    return Vec::new();
                }
                self.on_reply(result)
            }
            Input::Playback { generation, event } => {
                if self.is_stale(generation) {
                    tracing::trace!(?event, generation = generation.get(), "stale playback event");
                    return Vec::new();
                }
                self.on_playback(event)
            }
            Input::Resume { generation } => {
                if self.is_stale(generation) || !self.resume_pending {
                    tracing::trace!(generation = generation.get(), "stale resume");
                    return Vec::new();
                }
                self.resume_pending = false;
                self.begin_listening()
            }
        }
    }

    fn is_stale(&self, generation: Generation) -> bool {
        generation != self.generation
    }

    /// Issue a new generation, invalidating every outstanding resource
    fn advance(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.generation
    }

    fn start(&mut self) -> Vec<Effect> {
        let resumable = self.phase == Phase::Erroring && self.resume_pending;
        if self.phase != Phase::Idle && !resumable {
            tracing::debug!(phase = ?self.phase, "start ignored");
            return Vec::new();
        }
        self.begin_listening()
    }

    fn stop(&mut self) -> Vec<Effect> {
        let effect = match self.phase {
            Phase::Listening => Effect::StopCapture,
            Phase::Speaking => {
                self.pending_audio = None;
                Effect::StopPlayback
            }
            Phase::Idle | Phase::Erroring if self.resume_pending => {
                self.resume_pending = false;
                Effect::CancelResume
            }
            Phase::AwaitingReply => {
                tracing::debug!("stop ignored while awaiting reply");
                return Vec::new();
            }
            Phase::Idle | Phase::Erroring => return Vec::new(),
        };

        self.advance();
        self.phase = Phase::Idle;
        self.notice = Some("Stopped".to_string());
        tracing::info!("session stopped");
        vec![effect]
    }

    fn reset(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.phase {
            Phase::Listening => effects.push(Effect::StopCapture),
            Phase::AwaitingReply => effects.push(Effect::CancelReply),
            Phase::Speaking => effects.push(Effect::StopPlayback),
            Phase::Idle | Phase::Erroring => {}
        }

        self.pending_utterance = None;
        self.pending_audio = None;
        self.last_reply = None;
        self.history.clear();
        tracing::info!("session reset");

        effects.extend(self.begin_listening());
        effects
    }

    fn begin_listening(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.resume_pending {
            self.resume_pending = false;
            effects.push(Effect::CancelResume);
        }

        let generation = self.advance();
        self.phase = Phase::Listening;
        self.current_transcript.clear();
        self.notice = None;
        effects.push(Effect::StartCapture { generation });
        effects
    }

    /// Leave the current phase and resume capture after `after`
    fn schedule_resume(&mut self, phase: Phase, after: Duration) -> Vec<Effect> {
        let generation = self.advance();
        self.phase = phase;
        self.resume_pending = true;
        vec![Effect::ScheduleResume { generation, after }]
    }

    fn on_capture(&mut self, event: CaptureEvent) -> Vec<Effect> {
        if self.phase != Phase::Listening {
            tracing::debug!(phase = ?self.phase, ?event, "capture event out of phase");
            return Vec::new();
        }

        match event {
            CaptureEvent::Started => {
                tracing::debug!("capture started");
                Vec::new()
            }
            CaptureEvent::Interim(text) => {
                self.current_transcript = text;
                Vec::new()
            }
            CaptureEvent::Final(text) => {
                let utterance = text.trim().to_string();
                self.current_transcript = text;
                if utterance.is_empty() {
                    tracing::debug!("empty final transcript ignored");
                    return Vec::new();
                }

                tracing::info!(transcript = %utterance, "final transcript");
                let generation = self.advance();
                self.phase = Phase::AwaitingReply;
                self.pending_utterance = Some(utterance.clone());
                vec![
                    Effect::StopCapture,
                    Effect::SendReply {
                        generation,
                        text: utterance,
                    },
                ]
            }
            CaptureEvent::Error(reason) => {
                tracing::debug!(%reason, "recognition error, retrying");
                self.notice = Some(format!("Recognition error ({reason}), retrying"));
                let mut effects = vec![Effect::StopCapture];
                effects.extend(self.schedule_resume(Phase::Idle, self.timing.recognition_retry));
                effects
            }
            CaptureEvent::Ended => {
                tracing::debug!("capture ended without a result, retrying");
                self.schedule_resume(Phase::Idle, self.timing.recognition_retry)
            }
        }
    }

    fn on_reply(&mut self, result: std::result::Result<Reply, String>) -> Vec<Effect> {
        if self.phase != Phase::AwaitingReply {
            tracing::debug!(phase = ?self.phase, "reply out of phase");
            return Vec::new();
        }

        let utterance = self.pending_utterance.take().unwrap_or_default();
        match result {
            Ok(reply) => {
                self.history.append(Turn::new(utterance, reply.text.clone()));
                self.last_reply = Some(reply.text);

                if reply.audio.is_empty() {
                    tracing::debug!("reply carried no audio");
                    return self.schedule_resume(Phase::Idle, self.timing.playback_resume);
                }

                tracing::debug!(audio_bytes = reply.audio.len(), "reply received");
                let generation = self.advance();
                self.phase = Phase::Speaking;
                self.pending_audio = Some(reply.audio.clone());
                vec![Effect::Play {
                    generation,
                    audio: reply.audio,
                }]
            }
            Err(reason) => {
                tracing::warn!(error = %reason, "reply request failed");
                self.last_reply = Some(FALLBACK_REPLY.to_string());
                self.notice = Some(format!("Error: {reason}"));
                self.schedule_resume(Phase::Erroring, self.timing.reply_failure_resume)
            }
        }
    }

    fn on_playback(&mut self, event: PlaybackEvent) -> Vec<Effect> {
        if self.phase != Phase::Speaking {
            tracing::debug!(phase = ?self.phase, ?event, "playback event out of phase");
            return Vec::new();
        }

        match event {
            PlaybackEvent::Play => {
                self.notice = None;
                Vec::new()
            }
            PlaybackEvent::Pause => {
                self.notice = Some("Paused".to_string());
                Vec::new()
            }
            PlaybackEvent::Ended => {
                self.pending_audio = None;
                self.notice = None;
                self.schedule_resume(Phase::Idle, self.timing.playback_resume)
            }
        }
    }
}
