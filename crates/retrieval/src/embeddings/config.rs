//! Embedding configuration.

use incidex_core::AppConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings an embedding provider is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama", "mock"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Runtime base URL, for providers that talk HTTP
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on a single embedding call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Derive embedding settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            provider: config.embedding.provider.clone(),
            model: config.embedding.model.clone(),
            dimensions: config.embedding.dimensions,
            endpoint: Some(config.embedding_endpoint().to_string()),
            batch_size: config.embedding.batch_size.max(1),
            timeout_secs: config.embedding.timeout_secs.max(1),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
