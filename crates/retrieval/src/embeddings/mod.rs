//! Embedding capability: provider trait, implementations and the checked,
//! time-bounded calls the rest of the crate goes through.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{
    create_provider, DefaultProviderFactory, EmbeddingProvider, EmbeddingProviderFactory,
};

use incidex_core::{AppError, AppResult};
use std::time::Duration;

/// Scale a vector to unit L2 norm in place. Zero vectors are left as is.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Embed texts in batches, each batch bounded by `timeout`.
///
/// Fails if the provider returns the wrong number of vectors or any vector
/// of the wrong dimension.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
    timeout: Duration,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    tracing::info!(
        "Embedding {} texts using provider '{}' (model: {})",
        texts.len(),
        provider.provider_name(),
        provider.model_name()
    );

    let mut embeddings = Vec::with_capacity(texts.len());
    for (batch_no, batch) in texts.chunks(batch_size.max(1)).enumerate() {
        let vectors = tokio::time::timeout(timeout, provider.embed_many(batch))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "embedding batch {} exceeded {:?}",
                    batch_no, timeout
                ))
            })??;

        if vectors.len() != batch.len() {
            return Err(AppError::ProviderInit(format!(
                "Provider '{}' returned {} embeddings for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }
        for vector in &vectors {
            check_dimension(provider, vector)?;
        }

        embeddings.extend(vectors);
        tracing::debug!(
            "Embedded batch {} ({} of {} texts)",
            batch_no,
            embeddings.len(),
            texts.len()
        );
    }

    Ok(embeddings)
}

/// Embed one query text within `timeout`.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> AppResult<Vec<f32>> {
    let vector = tokio::time::timeout(timeout, provider.embed_one(text))
        .await
        .map_err(|_| AppError::Timeout(format!("query embedding exceeded {:?}", timeout)))??;

    check_dimension(provider, &vector)?;
    Ok(vector)
}

fn check_dimension(provider: &dyn EmbeddingProvider, vector: &[f32]) -> AppResult<()> {
    if vector.len() != provider.dimensions() {
        return Err(AppError::ProviderInit(format!(
            "Provider '{}' returned a {}-dimension vector, expected {}",
            provider.provider_name(),
            vector.len(),
            provider.dimensions()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::MockProvider;

    /// Provider that reports one dimension and produces another.
    #[derive(Debug)]
    struct LyingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for LyingProvider {
        fn provider_name(&self) -> &str {
            "lying"
        }
        fn model_name(&self) -> &str {
            "lying-v1"
        }
        fn dimensions(&self) -> usize {
            8
        }
        async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
        }
    }

    /// Provider that never answers in time.
    #[derive(Debug)]
    struct SlowProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn provider_name(&self) -> &str {
            "slow"
        }
        fn model_name(&self) -> &str {
            "slow-v1"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
        }
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0; 3];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[tokio::test]
    async fn test_embed_texts_batches_preserve_order() {
        let provider = MockProvider::new(64);
        let texts: Vec<String> = (0..7).map(|i| format!("incident number {}", i)).collect();

        let batched = embed_texts(&provider, &texts, 3, Duration::from_secs(5))
            .await
            .unwrap();
        let single = provider.embed_many(&texts).await.unwrap();
        assert_eq!(batched, single);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let texts = vec!["flood".to_string()];
        let err = embed_texts(&LyingProvider, &texts, 10, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(_)));

        let err = embed_query(&LyingProvider, "flood", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(_)));
    }

    #[tokio::test]
    async fn test_query_embedding_timeout() {
        let err = embed_query(&SlowProvider, "flood", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert!(err.is_retryable());
    }
}
