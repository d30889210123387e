//! Reply fetcher backed by the relay's `/chat` route

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::api::chat::{ChatResponse, ErrorResponse};
use crate::session::{Reply, ReplyFetcher};
use crate::{Error, Result};

/// Posts transcripts to `{backend}/chat`
#[derive(Debug, Clone)]
pub struct HttpReplyFetcher {
    client: reqwest::Client,
    chat_url: String,
}

impl HttpReplyFetcher {
    /// Create a fetcher for the given backend base URL
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            chat_url: format!("{}/chat", backend_url.trim_end_matches('/')),
        })
    }

    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ReplyFetcher for HttpReplyFetcher {
    async fn send(&self, text: &str) -> Result<Reply> {
        let response = self
            .client
            .post(&self.chat_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<ErrorResponse>(&body)
                .map_or(body, |e| e.error);
            tracing::warn!(status = %status, %reason, "backend rejected chat request");
            return Err(Error::Reply(format!("{status}: {reason}")));
        }

        let body: ChatResponse = response.json().await?;
        let audio = STANDARD
            .decode(body.audio_data.as_bytes())
            .map_err(|e| Error::Reply(format!("invalid audio payload: {e}")))?;

        tracing::debug!(
            chars = body.message.len(),
            audio_bytes = audio.len(),
            timestamp = %body.timestamp,
            "reply received"
        );

        Ok(Reply {
            text: body.message,
            audio: audio.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_normalizes_trailing_slash() {
        let fetcher = HttpReplyFetcher::new("http://localhost:3000/", Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.chat_url(), "http://localhost:3000/chat");
    }
}
