//! Conversational turn-taking
//!
//! Sequences listening → awaiting reply → speaking → listening, with
//! automatic recovery from recognition and reply failures.
//!
//! ```text
//!  Capture ──final──▶ Controller ──send──▶ Reply fetcher
//!     ▲                   │  ▲                  │
//!     │                   │  └──────reply───────┘
//!     └────resume─────────┤
//!                         ▼
//!                      Playback ──ended──▶ Controller
//! ```

mod adapters;
mod controller;
mod driver;
mod history;
mod phase;

pub use adapters::{
    AudioOutput, AudioPayload, CaptureEvent, CaptureSink, PlaybackEvent, PlaybackSink, Reply,
    ReplyFetcher, SpeechCapture,
};
pub use controller::{
    Effect, FALLBACK_REPLY, Generation, Input, SessionSnapshot, TurnController, TurnTiming,
};
pub use driver::{Command, SessionDriver, SessionHandle};
pub use history::{History, Turn};
pub use phase::Phase;
