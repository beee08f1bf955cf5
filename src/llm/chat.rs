//! OpenAI-compatible chat-completions client

use super::{GenerationError, Prompt, TextGenerator};
use crate::config::GeneratorConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat-completions client (Groq, OpenAI and compatible servers).
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    /// Create a client for `{base_url}/chat/completions`.
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.as_ref().trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    /// Build a client from configuration, reading the key from the
    /// environment variable the configuration names.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GenerationError::Unavailable(format!("{} is not set", config.api_key_env))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            ..Self::new(&config.base_url, api_key, &config.model)
        }
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Map a non-success HTTP status to a generation error.
    fn classify(status: StatusCode, body: String) -> GenerationError {
        match status.as_u16() {
            429 => GenerationError::RateLimited(body),
            503 | 529 => GenerationError::Overloaded(body),
            401 | 403 => GenerationError::Unavailable(format!("{}: {}", status, body)),
            _ if body.contains("rate_limit") => GenerationError::RateLimited(body),
            _ if body.contains("overloaded") => GenerationError::Overloaded(body),
            _ => GenerationError::Request(format!("{}: {}", status, body)),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending chat completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send chat completion request");
                GenerationError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::classify(status, body);
            if err.is_transient() {
                warn!(status = %status, "Generator signalled back-pressure");
            } else {
                error!(status = %status, error = %err, "Chat completion failed");
            }
            return Err(err);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse chat completion response");
            GenerationError::Parse(e.to_string())
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Parse("response has no message content".to_string()))
    }
}
