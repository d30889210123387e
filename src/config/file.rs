//! TOML configuration file loading
//!
//! Supports `~/.config/voicebot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoicebotConfigFile {
    /// Relay server settings
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis settings
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Speech recognition settings (voice client)
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Voice client settings
    #[serde(default)]
    pub client: ClientFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub static_dir: Option<String>,
    /// Requests per minute across all clients
    pub rate_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Chat completions endpoint
    pub url: Option<String>,
    /// Model identifier (e.g. "mistralai/mistral-7b-instruct")
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution
    pub referer: Option<String>,
    /// Sent as `X-Title`
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "google", "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub language: Option<String>,
    pub voice: Option<String>,
    pub model: Option<String>,
    pub speed: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    pub backend_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub listen_timeout_ms: Option<u64>,
    pub recognition_retry_ms: Option<u64>,
    pub reply_failure_resume_ms: Option<u64>,
    pub playback_resume_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openrouter: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoicebotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoicebotConfigFile {
    config_file_path().map_or_else(VoicebotConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files yield defaults, with a warning for the latter.
pub fn load_config_file_from(path: &Path) -> VoicebotConfigFile {
    if !path.exists() {
        return VoicebotConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoicebotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoicebotConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or a field has the wrong type
pub fn parse_config(content: &str) -> crate::Result<VoicebotConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/voicebot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicebot").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let fc = parse_config(
            r#"
            [server]
            port = 8080

            [client]
            playback_resume_ms = 1500
            "#,
        )
        .unwrap();

        assert_eq!(fc.server.port, Some(8080));
        assert_eq!(fc.client.playback_resume_ms, Some(1500));
        assert!(fc.llm.model.is_none());
    }

    #[test]
    fn wrong_type_is_a_toml_error() {
        let err = parse_config("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, crate::Error::Toml(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let fc = load_config_file_from(Path::new("/nonexistent/voicebot/config.toml"));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let fc = load_config_file_from(&path);
        assert!(fc.server.port.is_none());
    }
}
