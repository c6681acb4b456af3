//! Lazily loaded retriever over a persisted vector store.
//!
//! The first call that needs resources loads the store and builds the
//! embedding provider, exactly once per instance. State moves
//! `Uninitialized -> Loading -> Ready | Failed`; `Failed` is terminal.

use crate::embeddings::{
    embed_query, DefaultProviderFactory, EmbeddingConfig, EmbeddingProvider,
    EmbeddingProviderFactory,
};
use crate::rag::{RetrievalResult, RetrievedChunk};
use crate::vector_store::{StoreMetadata, VectorStore};
use incidex_core::{AppError, AppResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl ReadyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Uninitialized => "uninitialized",
            ReadyState::Loading => "loading",
            ReadyState::Ready => "ready",
            ReadyState::Failed => "failed",
        }
    }
}

/// Snapshot of the retriever for health reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieverStatus {
    pub state: ReadyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl RetrieverStatus {
    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }
}

/// Store and provider, published together.
#[derive(Debug)]
struct Resources {
    store: VectorStore,
    provider: Arc<dyn EmbeddingProvider>,
}

#[derive(Debug)]
enum LoadState {
    Uninitialized,
    Loading,
    Ready(Arc<Resources>),
    Failed(String),
}

pub struct Retriever {
    store_dir: PathBuf,
    config: EmbeddingConfig,
    factory: Arc<dyn EmbeddingProviderFactory>,
    state: Arc<RwLock<LoadState>>,
    init_gate: Arc<tokio::sync::Mutex<()>>,
    load_attempts: AtomicUsize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store_dir", &self.store_dir)
            .field("config", &self.config)
            .field("state", &self.status().state)
            .finish()
    }
}

impl Retriever {
    pub fn new(
        store_dir: impl Into<PathBuf>,
        config: EmbeddingConfig,
        factory: Arc<dyn EmbeddingProviderFactory>,
    ) -> Self {
        Self {
            store_dir: store_dir.into(),
            config,
            factory,
            state: Arc::new(RwLock::new(LoadState::Uninitialized)),
            init_gate: Arc::new(tokio::sync::Mutex::new(())),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Retriever whose provider is chosen by `config.provider`.
    pub fn with_default_factory(store_dir: impl Into<PathBuf>, config: EmbeddingConfig) -> Self {
        Self::new(store_dir, config, Arc::new(DefaultProviderFactory))
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Number of loads started so far. At most one per instance.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    /// Current state. Never triggers a load.
    pub fn status(&self) -> RetrieverStatus {
        match &*self.read_state() {
            LoadState::Uninitialized => RetrieverStatus {
                state: ReadyState::Uninitialized,
                detail: None,
                num_chunks: None,
                embedding_model: None,
            },
            LoadState::Loading => RetrieverStatus {
                state: ReadyState::Loading,
                detail: None,
                num_chunks: None,
                embedding_model: None,
            },
            LoadState::Ready(resources) => RetrieverStatus {
                state: ReadyState::Ready,
                detail: None,
                num_chunks: Some(resources.store.len()),
                embedding_model: Some(resources.provider.model_name().to_string()),
            },
            LoadState::Failed(reason) => RetrieverStatus {
                state: ReadyState::Failed,
                detail: Some(reason.clone()),
                num_chunks: None,
                embedding_model: None,
            },
        }
    }

    /// Load now instead of on first retrieval.
    pub async fn ensure_loaded(&self) -> AppResult<()> {
        self.resources().await.map(|_| ())
    }

    /// Sidecar metadata of the loaded store, if ready.
    pub fn store_metadata(&self) -> Option<StoreMetadata> {
        match &*self.read_state() {
            LoadState::Ready(resources) => Some(resources.store.metadata().clone()),
            _ => None,
        }
    }

    /// Embed `question` and return the `k` nearest chunks, nearest first.
    #[instrument(skip(self, question))]
    pub async fn retrieve(&self, question: &str, k: usize) -> AppResult<RetrievalResult> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Question must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(AppError::InvalidArgument(
                "Number of chunks must be at least 1".to_string(),
            ));
        }

        let resources = self.resources().await?;
        let query = embed_query(resources.provider.as_ref(), question, self.config.timeout()).await?;

        let neighbours = resources.store.index().search(&query, k)?;
        let mut hits = Vec::with_capacity(neighbours.len());
        for (id, distance) in neighbours {
            hits.push(RetrievedChunk {
                chunk: resources.store.chunks().get(id)?.clone(),
                distance,
            });
        }

        debug!(
            "Retrieved {} chunks (nearest distance {:?})",
            hits.len(),
            hits.first().map(|h| h.distance)
        );

        Ok(RetrievalResult { hits })
    }

    /// Publish a freshly built store in place of the loaded one.
    ///
    /// Only a ready retriever can swap, and only to a store embedded with the
    /// live provider's model and dimension.
    pub async fn swap(&self, store: VectorStore) -> AppResult<()> {
        let _gate = self.init_gate.lock().await;

        let provider = match &*self.read_state() {
            LoadState::Ready(resources) => resources.provider.clone(),
            LoadState::Failed(reason) => {
                return Err(AppError::NotReady(format!(
                    "retriever failed to load: {}",
                    reason
                )))
            }
            _ => {
                return Err(AppError::NotReady(
                    "retriever has not been loaded".to_string(),
                ))
            }
        };

        check_compatible(provider.as_ref(), store.metadata())?;

        let chunks = store.len();
        *self.write_state() = LoadState::Ready(Arc::new(Resources { store, provider }));
        info!("Swapped in new vector store ({} chunks)", chunks);
        Ok(())
    }

    /// The load runs in its own task, which holds the init gate until the
    /// outcome is published. A caller dropped mid-load does not abandon it.
    async fn resources(&self) -> AppResult<Arc<Resources>> {
        if let Some(resources) = self.published()? {
            return Ok(resources);
        }

        let gate = self.init_gate.clone().lock_owned().await;

        // Another caller may have finished the load while we waited.
        if let Some(resources) = self.published()? {
            return Ok(resources);
        }

        *self.write_state() = LoadState::Loading;
        self.load_attempts.fetch_add(1, Ordering::SeqCst);
        info!("Loading vector store from {}", self.store_dir.display());

        let state = self.state.clone();
        let dir = self.store_dir.clone();
        let config = self.config.clone();
        let factory = self.factory.clone();
        let task = tokio::spawn(async move {
            let outcome = load(dir, config, factory).await.map(Arc::new);
            *write(&state) = match &outcome {
                Ok(resources) => {
                    info!(
                        "Retriever ready: {} chunks, model {}",
                        resources.store.len(),
                        resources.provider.model_name()
                    );
                    LoadState::Ready(resources.clone())
                }
                Err(e) => {
                    error!(error_class = e.kind(), "Retriever load failed: {}", e);
                    LoadState::Failed(e.to_string())
                }
            };
            drop(gate);
            outcome
        });

        task.await
            .map_err(|e| AppError::Other(format!("Retriever load task failed: {}", e)))?
    }

    /// Ready resources, `None` when no load has finished, or `NotReady` when
    /// the load failed.
    fn published(&self) -> AppResult<Option<Arc<Resources>>> {
        match &*self.read_state() {
            LoadState::Ready(resources) => Ok(Some(resources.clone())),
            LoadState::Failed(reason) => Err(AppError::NotReady(format!(
                "retriever failed to load: {}",
                reason
            ))),
            LoadState::Uninitialized | LoadState::Loading => Ok(None),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LoadState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LoadState> {
        write(&self.state)
    }
}

fn write(state: &RwLock<LoadState>) -> RwLockWriteGuard<'_, LoadState> {
    state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn load(
    dir: PathBuf,
    config: EmbeddingConfig,
    factory: Arc<dyn EmbeddingProviderFactory>,
) -> AppResult<Resources> {
    let store = tokio::task::spawn_blocking(move || VectorStore::load(&dir))
        .await
        .map_err(|e| AppError::Other(format!("Store load task failed: {}", e)))??;

    let provider = factory.create(&config).await?;
    check_compatible(provider.as_ref(), store.metadata())?;

    Ok(Resources { store, provider })
}

fn check_compatible(provider: &dyn EmbeddingProvider, metadata: &StoreMetadata) -> AppResult<()> {
    if provider.model_name() != metadata.embedding_model {
        return Err(AppError::ProviderInit(format!(
            "Model mismatch: store was built with '{}', provider uses '{}'",
            metadata.embedding_model,
            provider.model_name()
        )));
    }
    if provider.dimensions() != metadata.embedding_dim {
        return Err(AppError::ProviderInit(format!(
            "Dimension mismatch: store has {}, provider produces {}",
            metadata.embedding_dim,
            provider.dimensions()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunker, ChunkerConfig};
    use crate::embeddings::providers::MockProvider;
    use crate::progress::ProgressReporter;
    use crate::record::IncidentRecord;
    use crate::vector_store::BuildOptions;
    use tempfile::TempDir;

    const DIM: usize = 64;

    fn mock_config(dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "mock".to_string(),
            model: "trigram-v1".to_string(),
            dimensions,
            ..Default::default()
        }
    }

    async fn saved_store(temp: &TempDir, records: &[IncidentRecord]) -> PathBuf {
        let dir = temp.path().join("vector_store");
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let store = VectorStore::build(
            records,
            &chunker,
            &MockProvider::new(DIM),
            BuildOptions::default(),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();
        store.save(&dir).unwrap();
        dir
    }

    fn corpus() -> Vec<IncidentRecord> {
        (1..=4)
            .map(|i| {
                IncidentRecord::new(i)
                    .with_field("incident_type", "Drainage Block")
                    .with_field("location", format!("Ward {}", i))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_status_does_not_load() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let retriever = Retriever::with_default_factory(dir, mock_config(DIM));

        assert_eq!(retriever.status().state, ReadyState::Uninitialized);
        assert_eq!(retriever.load_attempts(), 0);

        retriever.ensure_loaded().await.unwrap();
        let status = retriever.status();
        assert!(status.is_ready());
        assert_eq!(status.num_chunks, Some(4));
        assert_eq!(retriever.load_attempts(), 1);
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus_is_clamped() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let retriever = Retriever::with_default_factory(dir, mock_config(DIM));

        let result = retriever.retrieve("drainage", 50).await.unwrap();
        assert_eq!(result.len(), 4);
        for pair in result.hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn test_rejects_blank_question_and_zero_k() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let retriever = Retriever::with_default_factory(dir, mock_config(DIM));

        assert!(matches!(
            retriever.retrieve("   ", 3).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            retriever.retrieve("drainage", 0).await,
            Err(AppError::InvalidArgument(_))
        ));
        // Argument errors never trigger a load.
        assert_eq!(retriever.load_attempts(), 0);
    }

    #[tokio::test]
    async fn test_failed_load_is_terminal() {
        let temp = TempDir::new().unwrap();
        let retriever =
            Retriever::with_default_factory(temp.path().join("absent"), mock_config(DIM));

        let first = retriever.retrieve("flood", 1).await.unwrap_err();
        assert!(matches!(first, AppError::ResourceLoad(ref m) if m.contains("missing")));

        let second = retriever.retrieve("flood", 1).await.unwrap_err();
        assert!(matches!(second, AppError::NotReady(ref m) if m.contains("missing")));

        let status = retriever.status();
        assert_eq!(status.state, ReadyState::Failed);
        assert!(status.detail.unwrap().contains("missing"));
        assert_eq!(retriever.load_attempts(), 1);
    }

    #[tokio::test]
    async fn test_model_mismatch_is_provider_init() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let path = dir.join(crate::vector_store::METADATA_FILE);
        let mut metadata = StoreMetadata::load(&path).unwrap();
        metadata.embedding_model = "all-minilm".to_string();
        metadata.save(&path).unwrap();

        let retriever = Retriever::with_default_factory(dir, mock_config(DIM));
        let err = retriever.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(ref m) if m.contains("Model mismatch")));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_provider_init() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let retriever = Retriever::with_default_factory(dir, mock_config(32));

        let err = retriever.retrieve("drainage", 1).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(ref m) if m.contains("Dimension mismatch")));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_provider_init() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let config = EmbeddingConfig {
            provider: "nope".to_string(),
            ..mock_config(DIM)
        };
        let retriever = Retriever::with_default_factory(dir, config);

        let err = retriever.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, AppError::ProviderInit(_)));
    }

    #[tokio::test]
    async fn test_swap_publishes_new_store() {
        let temp = TempDir::new().unwrap();
        let dir = saved_store(&temp, &corpus()).await;
        let retriever = Retriever::with_default_factory(dir, mock_config(DIM));

        let fresh = {
            let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
            VectorStore::build(
                &corpus()[..2],
                &chunker,
                &MockProvider::new(DIM),
                BuildOptions::default(),
                &ProgressReporter::noop(),
            )
            .await
            .unwrap()
        };

        // Not loaded yet.
        assert!(matches!(
            retriever.swap(fresh.clone()).await,
            Err(AppError::NotReady(_))
        ));

        retriever.ensure_loaded().await.unwrap();
        retriever.swap(fresh).await.unwrap();
        assert_eq!(retriever.status().num_chunks, Some(2));
        assert_eq!(retriever.retrieve("drainage", 10).await.unwrap().len(), 2);
    }
}
