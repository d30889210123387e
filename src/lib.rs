//! `VoiceBot` - a voice chat relay and turn-taking voice client
//!
//! The crate has two halves:
//! - a relay server that answers `POST /chat` with a language-model reply and
//!   its synthesized speech
//! - a client whose turn controller cycles listening → awaiting reply →
//!   speaking, recovering from recognition and network failures
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    voicebot talk                     │
//! │  Mic / Console ─▶ Turn controller ─▶ Speaker / Muted │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ POST /chat
//! ┌──────────────────────────▼───────────────────────────┐
//! │                    voicebot serve                    │
//! │          validate ─▶ LLM ─▶ TTS ─▶ JSON reply        │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │     OpenRouter  │  Google TTS / OpenAI / ElevenLabs  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use llm::{ChatModel, OpenRouterClient};
pub use session::{
    Phase, Reply, ReplyFetcher, SessionDriver, SessionHandle, SessionSnapshot, Turn,
    TurnController, TurnTiming,
};
pub use voice::{Synthesizer, TextToSpeech};
