//! Chat completion client
//!
//! Single-shot completions against an OpenAI-compatible endpoint
//! (`OpenRouter` by default). Every request carries the configured system
//! prompt and the user's text; no conversation memory is kept server-side.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Anything that can answer a single user message
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply for `text`
    ///
    /// # Errors
    ///
    /// Returns error if the upstream request fails or returns no content
    async fn complete(&self, text: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `OpenRouter` chat completions client
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: SecretString,
    config: LlmConfig,
}

impl OpenRouterClient {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, config: LlmConfig) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("OpenRouter API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            config,
        })
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, text: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, chars = text.len(), "requesting completion");

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.api_key.expose_secret())
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion request failed");
            return Err(Error::Llm(format!("upstream error {status}: {body}")));
        }

        let completion: CompletionResponse = response.json().await?;
        extract_content(completion)
    }
}

fn extract_content(completion: CompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::Llm("completion contained no message".to_string()))
}
