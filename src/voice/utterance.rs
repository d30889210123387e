//! Utterance endpointing
//!
//! Segments a microphone stream into utterances with a simple RMS energy
//! gate: speech opens a segment, a run of trailing silence closes it.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to keep (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends an utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Longest utterance kept before it is cut off (in samples)
pub const MAX_UTTERANCE_SAMPLES: usize = 240_000; // 15 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Listening,
    /// Speech followed by enough silence; buffer is ready to transcribe
    Complete,
}

/// Result of feeding one block of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Nothing noteworthy
    None,
    /// First block of a new utterance
    SpeechStarted,
    /// Utterance finished; take it with [`UtteranceDetector::take_utterance`]
    UtteranceComplete,
    /// Noise burst too short to be speech was discarded
    Discarded,
}

/// Energy-based speech segmenter
#[derive(Debug)]
pub struct UtteranceDetector {
    threshold: f32,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector with the default energy threshold
    #[must_use]
    pub const fn new() -> Self {
        Self::with_threshold(ENERGY_THRESHOLD)
    }

    /// Create a detector with a custom RMS threshold
    #[must_use]
    pub const fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            state: DetectorState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed audio samples
    pub fn process(&mut self, samples: &[f32]) -> DetectorEvent {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                    return DetectorEvent::SpeechStarted;
                }
            }
            DetectorState::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                // Steady noise above the gate never produces a silence run
                if self.speech_buffer.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(
                        samples = self.speech_buffer.len(),
                        "utterance hit maximum length"
                    );
                    self.state = DetectorState::Complete;
                    return DetectorEvent::UtteranceComplete;
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(
                            samples = self.speech_buffer.len(),
                            "utterance complete"
                        );
                        self.state = DetectorState::Complete;
                        return DetectorEvent::UtteranceComplete;
                    }

                    tracing::trace!("too short for speech, resetting");
                    self.reset();
                    return DetectorEvent::Discarded;
                }
            }
            DetectorState::Complete => {}
        }

        DetectorEvent::None
    }

    /// Take the completed utterance and return to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let samples = std::mem::take(&mut self.speech_buffer);
        self.reset();
        samples
    }

    /// Get the accumulated speech buffer
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Check if speech is currently being accumulated
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == DetectorState::Listening
    }

    /// Reset detector to idle state
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
