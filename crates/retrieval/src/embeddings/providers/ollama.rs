//! Ollama embedding provider (`POST /api/embeddings`).
//!
//! The endpoint takes one prompt per call, so batches are embedded
//! sequentially. Transport failures and 5xx replies are retried with
//! exponential backoff; a missing model or a wrong dimension is not.

use crate::embeddings::{normalize, EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use incidex_core::AppError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDINGS_PATH: &str = "/api/embeddings";

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedReply {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Done(Vec<f32>),
    Retry(AppError),
    Fatal(AppError),
}

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl OllamaProvider {
    /// Connect and embed a short sample string, so a missing runtime, a missing
    /// model or a dimension mismatch fails here rather than mid-build.
    pub async fn new(config: EmbeddingConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::ProviderInit(format!("HTTP client for Ollama: {}", e)))?;

        let base = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/');

        let provider = Self {
            http,
            url: format!("{}{}", base, EMBEDDINGS_PATH),
            model: config.model.clone(),
            dimensions: config.dimensions,
        };

        provider.embed_with_retry("incident").await.map_err(|e| match e {
            AppError::ProviderInit(_) => e,
            other => AppError::ProviderInit(format!(
                "Ollama embeddings unavailable at {} ({}); is `ollama serve` running and `{}` pulled?",
                base, other, provider.model
            )),
        })?;
        debug!(model = %provider.model, dims = provider.dimensions, "Ollama embeddings ready");

        Ok(provider)
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut attempt = 1;
        loop {
            match self.attempt(text).await {
                Attempt::Done(vector) => return Ok(vector),
                Attempt::Fatal(e) => return Err(e),
                Attempt::Retry(e) if attempt >= MAX_ATTEMPTS => return Err(e),
                Attempt::Retry(e) => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                    warn!(attempt, ?backoff, "Ollama embedding failed, retrying: {}", e);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, text: &str) -> Attempt {
        let body = EmbedBody {
            model: &self.model,
            prompt: text,
        };
        let reply = match self.http.post(&self.url).json(&body).send().await {
            Ok(reply) => reply,
            Err(e) => return Attempt::Retry(AppError::Llm(format!("Ollama request: {}", e))),
        };

        let status = reply.status();
        if !status.is_success() {
            let raw = reply.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorReply>(&raw)
                .map(|r| r.error)
                .unwrap_or(raw);
            let error = AppError::Llm(format!("Ollama returned {}: {}", status, detail));
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Attempt::Retry(error)
            } else {
                Attempt::Fatal(error)
            };
        }

        let mut embedding = match reply.json::<EmbedReply>().await {
            Ok(r) => r.embedding,
            Err(e) => {
                return Attempt::Fatal(AppError::Llm(format!("Unreadable Ollama reply: {}", e)))
            }
        };

        if embedding.len() != self.dimensions {
            return Attempt::Fatal(AppError::ProviderInit(format!(
                "Ollama model '{}' produces {} dimensions, configured {}",
                self.model,
                embedding.len(),
                self.dimensions
            )));
        }

        normalize(&mut embedding);
        Attempt::Done(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Cannot embed empty text".to_string(),
            ));
        }
        self.embed_with_retry(text).await
    }
}
