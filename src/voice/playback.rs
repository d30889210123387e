//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Preferred playback rate (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Shared pause/stop flags for a playback in progress
#[derive(Debug, Clone, Default)]
pub struct PlaybackControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl PlaybackControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// How a blocking playback finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Stopped,
}

/// Decoded mono PCM
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        };

        let config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| c.channels() == 1 && supports_rate(c))
            .or_else(|| {
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| c.channels() == 2 && supports_rate(c))
            })
            .map(|c| c.with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE)).config())
            .map_or_else(
                // Fall back to whatever the device prefers and resample into it
                || {
                    device
                        .default_output_config()
                        .map(|c| c.config())
                        .map_err(|e| Error::Audio(e.to_string()))
                },
                Ok,
            )?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Output sample rate of the opened device
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Decode and play MP3 bytes, blocking until done or stopped
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_blocking(
        &self,
        mp3_data: &[u8],
        control: &PlaybackControl,
    ) -> Result<PlaybackOutcome> {
        let decoded = decode_mp3(mp3_data)?;
        let samples = if decoded.sample_rate == self.sample_rate() || decoded.samples.is_empty() {
            decoded.samples
        } else {
            resample(&decoded.samples, decoded.sample_rate, self.sample_rate())?
        };
        self.play_samples_blocking(samples, control)
    }

    /// Play mono samples at the device rate, blocking until done or stopped
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn play_samples_blocking(
        &self,
        samples: Vec<f32>,
        control: &PlaybackControl,
    ) -> Result<PlaybackOutcome> {
        if samples.is_empty() {
            return Ok(PlaybackOutcome::Finished);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = usize::from(config.channels);
        let sample_count = samples.len();

        let samples = Arc::new(Mutex::new(samples));
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);
        let paused_cb = Arc::clone(&control.paused);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(samples) = samples_cb.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    if paused_cb.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }

                    let mut pos = position_cb.load(Ordering::SeqCst);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished_cb.store(true, Ordering::SeqCst);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position_cb.store(pos, Ordering::SeqCst);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(self.sample_rate().max(1));
        let timeout = Duration::from_millis(duration_ms + 500);
        let mut played = Duration::ZERO;
        let mut last = Instant::now();

        // Poll for completion; time spent paused does not count toward the timeout
        let outcome = loop {
            if control.is_stopped() {
                break PlaybackOutcome::Stopped;
            }
            if finished.load(Ordering::SeqCst) || played > timeout {
                // Let the device drain its last buffer
                std::thread::sleep(Duration::from_millis(100));
                break PlaybackOutcome::Finished;
            }
            std::thread::sleep(Duration::from_millis(20));
            let now = Instant::now();
            if !control.is_paused() {
                played += now - last;
            }
            last = now;
        };

        drop(stream);
        tracing::debug!(
            samples = sample_count,
            position = position.load(Ordering::SeqCst),
            ?outcome,
            "playback complete"
        );

        Ok(outcome)
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the stream is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut decoded = DecodedAudio::default();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if decoded.sample_rate == 0 {
                    decoded.sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                if frame.channels == 2 {
                    decoded.samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    decoded
                        .samples
                        .extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if decoded.sample_rate == 0 {
        decoded.sample_rate = PLAYBACK_SAMPLE_RATE;
    }
    Ok(decoded)
}

/// Resample mono audio using rubato
///
/// # Errors
///
/// Returns error if the resampler rejects the rates
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + 1);

    for chunk in input.chunks(chunk_size) {
        let result = if chunk.len() == chunk_size {
            resampler.process(&[chunk], None)
        } else {
            resampler.process_partial(Some(&[chunk]), None)
        }
        .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}
