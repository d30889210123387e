//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{ApiKeys, TtsConfig, TtsProviderKind};
use crate::{Error, Result};

/// Google Translate TTS endpoint (no key required)
const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text Google accepts in a single request
pub const GOOGLE_CHUNK_LIMIT: usize = 100;

/// Anything that can turn reply text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text`, returning encoded audio bytes (MP3)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Debug)]
enum TtsProvider {
    Google { language: String },
    OpenAI { api_key: SecretString, speed: f32 },
    ElevenLabs { api_key: SecretString },
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    voice: String,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a keyless Google Translate TTS instance
    #[must_use]
    pub fn new_google(language: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            voice: String::new(),
            model: String::new(),
            provider: TtsProvider::Google {
                language: language.into(),
            },
        }
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: SecretString, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            voice,
            model,
            provider: TtsProvider::OpenAI { api_key, speed },
        })
    }

    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: SecretString, voice_id: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            voice: voice_id,
            model,
            provider: TtsProvider::ElevenLabs { api_key },
        })
    }

    /// Build the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider's API key is missing
    pub fn from_config(config: &TtsConfig, keys: &ApiKeys) -> Result<Self> {
        let missing = |name: &str| Error::Config(format!("{name} API key required for TTS"));

        match config.provider {
            TtsProviderKind::Google => Ok(Self::new_google(config.language.clone())),
            TtsProviderKind::OpenAI => Self::new_openai(
                keys.openai.clone().ok_or_else(|| missing("OpenAI"))?,
                config.voice.clone(),
                config.speed,
                config.model.clone(),
            ),
            TtsProviderKind::ElevenLabs => {
                let model = if config.model == "tts-1" {
                    "eleven_monolingual_v1".to_string()
                } else {
                    config.model.clone()
                };
                Self::new_elevenlabs(
                    keys.elevenlabs.clone().ok_or_else(|| missing("ElevenLabs"))?,
                    config.voice.clone(),
                    model,
                )
            }
        }
    }

    /// Synthesize using Google Translate TTS, concatenating MP3 chunks
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = split_for_google(text);
        let total = chunks.len();

        // Chunks are fetched concurrently; try_join_all keeps them in order
        let parts = futures::future::try_join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(idx, chunk)| self.fetch_google_chunk(chunk, idx, total, language)),
        )
        .await?;

        let audio = parts.concat();
        tracing::debug!(chunks = total, bytes = audio.len(), "google tts complete");
        Ok(audio)
    }

    async fn fetch_google_chunk(
        &self,
        chunk: &str,
        idx: usize,
        total: usize,
        language: &str,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(GOOGLE_TTS_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("total", total.to_string().as_str()),
                ("idx", idx.to_string().as_str()),
                ("textlen", chunk.chars().count().to_string().as_str()),
                ("client", "tw-ob"),
                ("prev", "input"),
                ("ttsspeed", "1"),
            ])
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str, api_key: &SecretString, speed: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str, api_key: &SecretString) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            urlencoding::encode(&self.voice)
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        match &self.provider {
            TtsProvider::Google { language } => self.synthesize_google(text, language).await,
            TtsProvider::OpenAI { api_key, speed } => {
                self.synthesize_openai(text, api_key, *speed).await
            }
            TtsProvider::ElevenLabs { api_key } => self.synthesize_elevenlabs(text, api_key).await,
        }
    }
}

/// Split text into word-aligned chunks of at most [`GOOGLE_CHUNK_LIMIT`] characters
///
/// Words longer than the limit are hard-split.
#[must_use]
pub fn split_for_google(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > GOOGLE_CHUNK_LIMIT {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(GOOGLE_CHUNK_LIMIT)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > GOOGLE_CHUNK_LIMIT {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
