//! Configuration management for voicebot
//!
//! Every value resolves as environment variable > config file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::session::TurnTiming;
use crate::{Error, Result};

use file::VoicebotConfigFile;

/// Default chat completions endpoint
pub const DEFAULT_LLM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "mistralai/mistral-7b-instruct";

/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Dev, a brutally honest and practical AI assistant. Keep responses concise and helpful.";

/// Voicebot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server configuration
    pub server: ServerConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// Speech recognition configuration (voice client)
    pub stt: SttConfig,

    /// Voice client configuration
    pub client: ClientConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// HTTP relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Global requests-per-minute limit, disabled when unset
    pub rate_limit_per_minute: Option<u32>,
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub referer: String,
    pub title: String,
}

/// Speech synthesis backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProviderKind {
    /// Keyless Google Translate TTS endpoint
    #[default]
    Google,
    OpenAI,
    ElevenLabs,
}

impl TtsProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAI => "openai",
            Self::ElevenLabs => "elevenlabs",
        }
    }
}

impl FromStr for TtsProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProviderKind,

    /// Language code for Google TTS (e.g. "en")
    pub language: String,

    /// Voice identifier (`OpenAI` voice name or `ElevenLabs` voice ID)
    pub voice: String,

    /// Model identifier for `OpenAI`/`ElevenLabs`
    pub model: String,

    /// Speed multiplier (`OpenAI` only)
    pub speed: f32,
}

/// Speech recognition backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProviderKind {
    #[default]
    Whisper,
    Deepgram,
}

impl FromStr for SttProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProviderKind,
    pub model: String,
    pub language: Option<String>,
}

/// Voice client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the relay backend
    pub backend_url: String,

    /// Timeout for a single `/chat` request
    pub request_timeout: Duration,

    /// How long the microphone waits for speech before reporting no-speech
    pub listen_timeout: Duration,

    /// Delays before capture resumes
    pub timing: TurnTiming,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenRouter` API key (chat completions)
    pub openrouter: Option<SecretString>,

    /// `OpenAI` API key (Whisper STT, TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and the default config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources<E>(fc: VoicebotConfigFile, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let secret = |key: &str, file: Option<String>| {
            env(key)
                .or(file)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };

        let api_keys = ApiKeys {
            openrouter: secret("OPENROUTER_API_KEY", fc.api_keys.openrouter),
            openai: secret("OPENAI_API_KEY", fc.api_keys.openai),
            elevenlabs: secret("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
            deepgram: secret("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
        };

        let server = ServerConfig {
            port: parse_env(&env, "VOICEBOT_PORT")?
                .or(parse_env(&env, "PORT")?)
                .or(fc.server.port)
                .unwrap_or(3000),
            static_dir: env("VOICEBOT_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            rate_limit_per_minute: parse_env(&env, "VOICEBOT_RATE_LIMIT")?
                .or(fc.server.rate_limit)
                .filter(|rpm| *rpm > 0),
        };

        let llm = LlmConfig {
            url: env("OPENROUTER_URL")
                .or(fc.llm.url)
                .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            model: env("VOICEBOT_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            system_prompt: env("VOICEBOT_SYSTEM_PROMPT")
                .or(fc.llm.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: parse_env(&env, "VOICEBOT_LLM_MAX_TOKENS")?
                .or(fc.llm.max_tokens)
                .unwrap_or(200),
            temperature: parse_env(&env, "VOICEBOT_LLM_TEMPERATURE")?
                .or(fc.llm.temperature)
                .unwrap_or(0.7),
            referer: fc
                .llm
                .referer
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            title: fc.llm.title.unwrap_or_else(|| "VoiceBot".to_string()),
        };

        let tts = TtsConfig {
            provider: env("VOICEBOT_TTS_PROVIDER")
                .or(fc.tts.provider)
                .map(|p| p.parse())
                .transpose()?
                .unwrap_or_default(),
            language: env("VOICEBOT_TTS_LANGUAGE")
                .or(fc.tts.language)
                .unwrap_or_else(|| "en".to_string()),
            voice: env("VOICEBOT_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or_else(|| "alloy".to_string()),
            model: env("VOICEBOT_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| "tts-1".to_string()),
            speed: fc.tts.speed.unwrap_or(1.0),
        };

        let stt_provider: SttProviderKind = env("VOICEBOT_STT_PROVIDER")
            .or(fc.stt.provider)
            .map(|p| p.parse())
            .transpose()?
            .unwrap_or_default();
        let stt = SttConfig {
            provider: stt_provider,
            model: env("VOICEBOT_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| match stt_provider {
                    SttProviderKind::Whisper => "whisper-1".to_string(),
                    SttProviderKind::Deepgram => "nova-2".to_string(),
                }),
            language: env("VOICEBOT_STT_LANGUAGE").or(fc.stt.language),
        };

        let defaults = TurnTiming::default();
        let millis = |key: &str, file: Option<u64>, default: Duration| -> Result<Duration> {
            Ok(parse_env::<u64, _>(&env, key)?
                .or(file)
                .map_or(default, Duration::from_millis))
        };
        let client = ClientConfig {
            backend_url: env("VOICEBOT_BACKEND_URL")
                .or(fc.client.backend_url)
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            request_timeout: millis(
                "VOICEBOT_REQUEST_TIMEOUT_MS",
                fc.client.request_timeout_ms,
                Duration::from_secs(30),
            )?,
            listen_timeout: millis(
                "VOICEBOT_LISTEN_TIMEOUT_MS",
                fc.client.listen_timeout_ms,
                Duration::from_secs(8),
            )?,
            timing: TurnTiming {
                recognition_retry: millis(
                    "VOICEBOT_RECOGNITION_RETRY_MS",
                    fc.client.recognition_retry_ms,
                    defaults.recognition_retry,
                )?,
                reply_failure_resume: millis(
                    "VOICEBOT_REPLY_FAILURE_RESUME_MS",
                    fc.client.reply_failure_resume_ms,
                    defaults.reply_failure_resume,
                )?,
                playback_resume: millis(
                    "VOICEBOT_PLAYBACK_RESUME_MS",
                    fc.client.playback_resume_ms,
                    defaults.playback_resume,
                )?,
            },
        };

        Ok(Self {
            server,
            llm,
            tts,
            stt,
            client,
            api_keys,
        })
    }

    /// The `OpenRouter` key, required to run the relay
    ///
    /// # Errors
    ///
    /// Returns error if `OPENROUTER_API_KEY` is not set
    pub fn openrouter_key(&self) -> Result<&SecretString> {
        self.api_keys.openrouter.as_ref().ok_or_else(|| {
            Error::Config("OPENROUTER_API_KEY is not set in environment variables".to_string())
        })
    }
}

/// Parse an environment value, reporting the variable name on failure
fn parse_env<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}")))
        })
        .transpose()
}
