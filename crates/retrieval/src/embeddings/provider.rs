//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use incidex_core::{AppError, AppResult};
use std::sync::Arc;

/// Maps text to fixed-dimension, L2-normalized vectors.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Embed several texts; output order matches input order.
    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_many(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Other("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// Failure to build the provider is a `ProviderInit` error.
pub async fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "mock" => {
            let provider = super::providers::mock::MockProvider::new(config.dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaProvider::new(config.clone()).await?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::ProviderInit(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama",
            config.provider
        ))),
    }
}

/// Builds embedding providers for the retriever.
///
/// The retriever depends on this seam rather than on [`create_provider`]
/// directly so callers can substitute their own construction.
#[async_trait::async_trait]
pub trait EmbeddingProviderFactory: Send + Sync {
    async fn create(&self, config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>>;
}

/// Factory dispatching on `config.provider`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProviderFactory;

#[async_trait::async_trait]
impl EmbeddingProviderFactory for DefaultProviderFactory {
    async fn create(&self, config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
        create_provider(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_mock_provider() {
        let provider = create_provider(&mock_config()).await.unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[tokio::test]
    async fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..mock_config()
        };

        let result = create_provider(&config).await;
        match result {
            Err(AppError::ProviderInit(msg)) => {
                assert!(msg.contains("Unknown embedding provider"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected provider init failure"),
        }
    }

    #[tokio::test]
    async fn test_default_factory_embed_one() {
        let provider = DefaultProviderFactory.create(&mock_config()).await.unwrap();
        let embedding = provider.embed_one("tree fall at Kadri").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
