//! In-process generation client for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use incidex_core::{AppError, AppResult};
use std::sync::Mutex;
use std::time::Duration;

/// How the mock answers.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Describe the request: model and number of context sections seen.
    Echo,
    /// Always return this text.
    Fixed(String),
    /// Always fail with a generation error carrying this message.
    Fail(String),
}

/// Deterministic `LlmClient` that records every request it receives.
pub struct MockLlmClient {
    behavior: MockBehavior,
    delay: Option<Duration>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Echo)
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &LlmRequest) {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match &self.behavior {
            MockBehavior::Echo => {
                let sections = request
                    .prompt
                    .split("\n\n")
                    .filter(|part| part.contains("Incident ID:"))
                    .count();
                format!(
                    "[{}] Answer drawn from {} incident section(s).",
                    request.model, sections
                )
            }
            MockBehavior::Fixed(text) => text.clone(),
            MockBehavior::Fail(message) => return Err(AppError::Generation(message.clone())),
        };

        let prompt_tokens = request.prompt.split_whitespace().count() as u32;
        let completion_tokens = content.split_whitespace().count() as u32;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_names_model_and_sections() {
        let client = MockLlmClient::new();
        let prompt = "INCIDENT DATA:\nIncident ID: 1\nType: Flood\n\nIncident ID: 2\nType: Tree Fall\n\nUSER QUESTION: floods?";
        let response = client
            .complete(&LlmRequest::new(prompt, "llama2"))
            .await
            .unwrap();

        assert!(response.content.starts_with("[llama2]"));
        assert!(response.content.contains("2 incident section(s)"));
        assert_eq!(client.requests().len(), 1);
        assert_eq!(client.requests()[0].model, "llama2");
    }

    #[tokio::test]
    async fn test_fixed_and_fail() {
        let fixed = MockLlmClient::with_behavior(MockBehavior::Fixed("Three floods.".into()));
        let response = fixed
            .complete(&LlmRequest::new("q", "mistral"))
            .await
            .unwrap();
        assert_eq!(response.content, "Three floods.");

        let failing = MockLlmClient::with_behavior(MockBehavior::Fail("model crashed".into()));
        let err = failing
            .complete(&LlmRequest::new("q", "mistral"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
        assert_eq!(failing.requests().len(), 1);
    }
}
