//! Ollama generation client (`POST /api/generate`, non-streaming).

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use incidex_core::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Default Ollama base URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Sampling>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Sampling {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Client for one Ollama runtime; serves any model the runtime has pulled.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(request: &'a LlmRequest) -> GenerateBody<'a> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            Sampling {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options,
        }
    }

    /// A reply cut short is a failure, never a partial answer.
    fn into_response(reply: GenerateReply) -> AppResult<LlmResponse> {
        if !reply.done {
            return Err(AppError::Generation(format!(
                "Ollama returned an incomplete answer from '{}'",
                reply.model
            )));
        }
        Ok(LlmResponse {
            content: reply.response,
            model: reply.model,
            prompt_tokens: reply.prompt_eval_count,
            completion_tokens: reply.eval_count,
        })
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Ollama generate"
        );

        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        let reply = self
            .http
            .post(&url)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Ollama unreachable at {}: {}", self.base_url, e)))?;

        let status = reply.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::Generation(format!(
                "model '{}' is not available; run: ollama pull {}",
                request.model, request.model
            )));
        }
        if !status.is_success() {
            let detail = reply.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Ollama returned {}: {}",
                status, detail
            )));
        }

        let reply: GenerateReply = reply
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Unreadable Ollama reply: {}", e)))?;

        tracing::debug!(
            model = %reply.model,
            eval_count = ?reply.eval_count,
            "Ollama generate done"
        );
        Self::into_response(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(OllamaClient::new().base_url(), DEFAULT_OLLAMA_URL);
        let client = OllamaClient::with_base_url("http://ollama:11434/");
        assert_eq!(client.base_url(), "http://ollama:11434");
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_body_carries_sampling() {
        let request = LlmRequest::new("Hello", "llama2")
            .with_temperature(0.7)
            .with_max_tokens(100);

        let body = OllamaClient::body(&request);
        assert_eq!(body.model, "llama2");
        assert!(!body.stream);
        assert_eq!(
            body.options,
            Some(Sampling {
                temperature: Some(0.7),
                num_predict: Some(100),
            })
        );
    }

    #[test]
    fn test_body_without_sampling_omits_options() {
        let request = LlmRequest::new("Hi", "mistral");
        let json = serde_json::to_value(OllamaClient::body(&request)).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_reply_conversion() {
        let reply: GenerateReply = serde_json::from_str(
            r#"{"model":"mistral","response":"Two floods.","done":true,"prompt_eval_count":40,"eval_count":4}"#,
        )
        .unwrap();
        let response = OllamaClient::into_response(reply).unwrap();
        assert_eq!(response.content, "Two floods.");
        assert_eq!(response.total_tokens(), Some(44));
    }

    #[test]
    fn test_incomplete_reply_is_generation_error() {
        let reply: GenerateReply =
            serde_json::from_str(r#"{"model":"mistral","response":"Two fl","done":false}"#)
                .unwrap();
        let err = OllamaClient::into_response(reply).unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }
}
