//! Generation client seam.
//!
//! A client is bound to a runtime, not to a model: the model id travels with
//! each request, so one client can serve every model the runtime hosts.

use incidex_core::AppResult;
use serde::{Deserialize, Serialize};

/// One grounded-answer generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Fully rendered prompt, context included
    pub prompt: String,

    /// Model identifier as the runtime knows it ("mistral", "gemma:2b")
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Whatever the runtime produced. Token counts are reported when the runtime
/// exposes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

impl LlmResponse {
    /// The trimmed answer, or `None` when the runtime produced only
    /// whitespace.
    pub fn answer(&self) -> Option<&str> {
        let text = self.content.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn total_tokens(&self) -> Option<u32> {
        match (self.prompt_tokens, self.completion_tokens) {
            (Some(p), Some(c)) => p.checked_add(c),
            _ => None,
        }
    }
}

/// A text generation runtime.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Runtime name ("ollama", "mock").
    fn provider_name(&self) -> &str;

    /// Generate the whole answer in one call.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
