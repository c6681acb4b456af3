//! LLM client factory.
//!
//! Resolves a provider name to a client implementation, and exposes the
//! model-keyed [`ClientFactory`] seam the answer synthesizer switches models
//! through.

use crate::client::LlmClient;
use crate::providers::{MockLlmClient, OllamaClient};
use crate::types::ProviderType;
use incidex_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
///
/// # Errors
/// Returns `AppError::ProviderInit` if the provider is unknown.
pub fn create_client(provider: &str, endpoint: Option<&str>) -> AppResult<Arc<dyn LlmClient>> {
    match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let client = match endpoint {
                Some(base_url) => OllamaClient::with_base_url(base_url),
                None => OllamaClient::new(),
            };
            Ok(Arc::new(client))
        }
        Some(ProviderType::Mock) => Ok(Arc::new(MockLlmClient::new())),
        None => Err(AppError::ProviderInit(format!(
            "Unknown provider: {}. Supported: ollama, mock",
            provider
        ))),
    }
}

/// Produces a generation client for a given model identifier.
pub trait ClientFactory: Send + Sync {
    fn create(&self, model_id: &str) -> AppResult<Arc<dyn LlmClient>>;
}

/// [`ClientFactory`] backed by one configured provider and endpoint.
#[derive(Debug, Clone)]
pub struct ProviderClientFactory {
    provider: ProviderType,
    endpoint: Option<String>,
}

impl ProviderClientFactory {
    pub fn new(provider: &str, endpoint: Option<&str>) -> AppResult<Self> {
        let provider = ProviderType::parse(provider).ok_or_else(|| {
            AppError::ProviderInit(format!(
                "Unknown provider: {}. Supported: ollama, mock",
                provider
            ))
        })?;

        Ok(Self {
            provider,
            endpoint: endpoint.map(str::to_string),
        })
    }
}

impl ClientFactory for ProviderClientFactory {
    fn create(&self, model_id: &str) -> AppResult<Arc<dyn LlmClient>> {
        if model_id.trim().is_empty() {
            return Err(AppError::ProviderInit(
                "Model identifier cannot be empty".to_string(),
            ));
        }

        tracing::debug!(
            provider = self.provider.as_str(),
            model = model_id,
            "Creating generation client"
        );

        create_client(self.provider.as_str(), self.endpoint.as_deref())
    }
}
