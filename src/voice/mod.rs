//! Voice processing module
//!
//! Microphone capture with utterance endpointing, speech recognition,
//! speech synthesis and speaker playback.

mod capture;
mod playback;
mod stt;
mod tts;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, SampleBuffer, samples_to_wav};
pub use playback::{
    AudioPlayback, DecodedAudio, PlaybackControl, PlaybackOutcome, decode_mp3, resample,
};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{GOOGLE_CHUNK_LIMIT, Synthesizer, TextToSpeech, split_for_google};
pub use utterance::{
    DetectorEvent, DetectorState, MAX_UTTERANCE_SAMPLES, UtteranceDetector, calculate_energy,
};
