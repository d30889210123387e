//! `/chat` relay: text in, reply text plus synthesized speech out

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ApiState;

/// Longest accepted message, in characters, after sanitizing
pub const MAX_TEXT_CHARS: usize = 1000;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Chat reply body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    /// Base64-encoded MP3
    pub audio_data: String,
    /// ISO-8601 UTC
    pub timestamp: String,
}

/// Error body shared by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Validate and clean user text
///
/// Angle brackets are removed and surrounding whitespace trimmed; the result
/// must hold between 1 and [`MAX_TEXT_CHARS`] characters.
///
/// # Errors
///
/// Returns the client-facing validation failure
pub fn sanitize_text(raw: Option<&str>) -> Result<String, ChatError> {
    let raw = raw.ok_or(ChatError::MissingText)?;
    if raw.is_empty() {
        return Err(ChatError::MissingText);
    }

    let cleaned: String = raw.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let cleaned = cleaned.trim();

    match cleaned.chars().count() {
        0 => Err(ChatError::InvalidLength),
        n if n > MAX_TEXT_CHARS => Err(ChatError::InvalidLength),
        _ => Ok(cleaned.to_string()),
    }
}

/// Answer one message: language model, then speech synthesis
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected chat body");
        ChatError::InvalidBody
    })?;

    let text = sanitize_text(request.text.as_deref())?;
    tracing::info!(chars = text.chars().count(), "chat request");

    let reply = state.llm.complete(&text).await.map_err(|e| {
        tracing::error!(error = %e, "language model failed");
        ChatError::Upstream
    })?;

    let audio = state.tts.synthesize(&reply).await.map_err(|e| {
        tracing::error!(error = %e, "speech synthesis failed");
        ChatError::Upstream
    })?;

    tracing::debug!(reply_chars = reply.len(), audio_bytes = audio.len(), "chat reply ready");

    Ok(Json(ChatResponse {
        message: reply,
        audio_data: STANDARD.encode(&audio),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Chat API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatError {
    MissingText,
    InvalidLength,
    InvalidBody,
    Upstream,
}

impl ChatError {
    /// Message sent to the client
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingText => "No text provided",
            Self::InvalidLength => "Text must be between 1 and 1000 characters",
            Self::InvalidBody => "Invalid request body",
            Self::Upstream => "LLM or TTS failed",
        }
    }

    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::MissingText | Self::InvalidLength | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_empty_text() {
        assert_eq!(sanitize_text(None), Err(ChatError::MissingText));
        assert_eq!(sanitize_text(Some("")), Err(ChatError::MissingText));
    }

    #[test]
    fn blank_after_cleaning_is_invalid_length() {
        assert_eq!(sanitize_text(Some("   ")), Err(ChatError::InvalidLength));
        assert_eq!(sanitize_text(Some("<>")), Err(ChatError::InvalidLength));
    }

    #[test]
    fn angle_brackets_are_stripped() {
        assert_eq!(
            sanitize_text(Some("  <b>hello</b> ")).unwrap(),
            "bhello/b"
        );
    }

    #[test]
    fn length_is_counted_in_characters() {
        let max = "é".repeat(MAX_TEXT_CHARS);
        assert_eq!(sanitize_text(Some(&max)).unwrap().chars().count(), MAX_TEXT_CHARS);

        let over = "a".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(sanitize_text(Some(&over)), Err(ChatError::InvalidLength));
    }

    #[test]
    fn response_uses_camel_case() {
        let body = ChatResponse {
            message: "Hi".to_string(),
            audio_data: "AAEC".to_string(),
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["audioData"], "AAEC");
        assert!(json.get("audio_data").is_none());
    }
}
