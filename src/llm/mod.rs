//! Text-generation capability used by extraction and question answering
//!
//! `TextGenerator` abstracts over transport (HTTP chat completions, mock)
//! so the pipeline doesn't depend on how the model is reached.

mod chat;

pub use chat::ChatClient;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A system + user message pair sent to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Errors from the generation capability
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("model overloaded: {0}")]
    Overloaded(String),
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("response parse error: {0}")]
    Parse(String),
}

impl GenerationError {
    /// Rate-limit and overload signals are worth retrying after a cooldown
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Overloaded(_))
    }
}

/// Client trait for the text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Mock generator for testing and offline runs.
///
/// Replies are consumed in order; once the script is exhausted the fallback
/// reply is used, or `Unavailable` if none was configured.
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<Prompt>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn with_response(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, error: GenerationError) -> Self {
        self.push(Err(error));
        self
    }

    /// Reply used whenever the script is empty.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Queue a reply on a shared generator.
    pub fn push(&self, reply: Result<String, GenerationError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(reply) => reply,
            None => self.fallback.clone().ok_or_else(|| {
                GenerationError::Unavailable("mock script exhausted".to_string())
            }),
        }
    }
}

/// Render an extraction reply as the model would return it.
#[cfg(test)]
pub(crate) fn mock_extraction(characters: &[(&str, &str)], events: &[&str]) -> String {
    let characters: Vec<serde_json::Value> = characters
        .iter()
        .map(|(name, emotion)| serde_json::json!({ "name": name, "emotion": emotion }))
        .collect();
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|d| serde_json::json!({ "description": d }))
        .collect();
    serde_json::json!({
        "characters": characters,
        "locations": [],
        "events": events,
        "relationships": [],
    })
    .to_string()
}
