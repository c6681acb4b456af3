//! Query orchestration: validate, retrieve, synthesize, report.
//!
//! This is what the HTTP layer and the one-shot CLI command call into.

use crate::chunk::Chunk;
use crate::embeddings::{DefaultProviderFactory, EmbeddingConfig, EmbeddingProviderFactory};
use crate::rag::Synthesizer;
use crate::retriever::{ReadyState, Retriever};
use crate::stats::{record_stats, RecordStats};
use incidex_core::{AppConfig, AppError, AppResult};
use incidex_llm::{ClientFactory, ProviderClientFactory};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_NUM_CHUNKS: i64 = 5;

fn default_num_chunks() -> i64 {
    DEFAULT_NUM_CHUNKS
}

/// A question about the incident log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Signed so that non-positive values reach validation instead of
    /// failing deserialization.
    #[serde(default = "default_num_chunks")]
    pub num_chunks: i64,
    /// Generation model; the active model when absent.
    #[serde(default)]
    pub model: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_chunks: DEFAULT_NUM_CHUNKS,
            model: None,
        }
    }

    pub fn with_num_chunks(mut self, num_chunks: i64) -> Self {
        self.num_chunks = num_chunks;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn validate(&self) -> AppResult<usize> {
        if self.query.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if self.num_chunks <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "num_chunks must be positive, got {}",
                self.num_chunks
            )));
        }
        if matches!(&self.model, Some(model) if model.trim().is_empty()) {
            return Err(AppError::InvalidArgument(
                "model must not be empty when given".to_string(),
            ));
        }
        usize::try_from(self.num_chunks).map_err(|_| {
            AppError::InvalidArgument(format!("num_chunks {} is too large", self.num_chunks))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub relevant_chunks: Vec<Chunk>,
    pub num_chunks_retrieved: usize,
    pub processing_time_ms: f64,
}

/// A failed query. Carries the retrieval count when retrieval succeeded and
/// a later stage failed.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: AppError,
    pub num_chunks_retrieved: Option<usize>,
}

impl From<AppError> for QueryFailure {
    fn from(error: AppError) -> Self {
        Self {
            error,
            num_chunks_retrieved: None,
        }
    }
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.num_chunks_retrieved {
            Some(n) => write!(f, "{} (after retrieving {} chunks)", self.error, n),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for QueryFailure {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// "ready" or "not ready"
    pub status: &'static str,
    pub state: ReadyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub generation_model: String,
}

impl HealthReport {
    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelList {
    pub models: Vec<String>,
    pub active: String,
}

pub struct QueryService {
    retriever: Arc<Retriever>,
    synthesizer: Arc<Synthesizer>,
    models: Vec<String>,
    records_path: PathBuf,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("retriever", &self.retriever)
            .field("synthesizer", &self.synthesizer)
            .field("records_path", &self.records_path)
            .finish()
    }
}

impl QueryService {
    pub fn new(
        retriever: Arc<Retriever>,
        synthesizer: Arc<Synthesizer>,
        models: Vec<String>,
        records_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            models,
            records_path: records_path.into(),
        }
    }

    /// Wire the service from configuration with the default provider
    /// factories.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let clients = ProviderClientFactory::new(
            &config.generation.provider,
            Some(&config.generation.endpoint),
        )?;
        Self::with_factories(config, Arc::new(DefaultProviderFactory), Arc::new(clients))
    }

    pub fn with_factories(
        config: &AppConfig,
        embeddings: Arc<dyn EmbeddingProviderFactory>,
        clients: Arc<dyn ClientFactory>,
    ) -> AppResult<Self> {
        let retriever = Retriever::new(
            config.storage_dir.clone(),
            EmbeddingConfig::from_app_config(config),
            embeddings,
        );

        let template = incidex_prompt::resolve_template(config.prompt_file.as_deref())?;
        let synthesizer = Synthesizer::new(
            clients,
            &config.generation.model,
            template,
            Duration::from_secs(config.generation.timeout_secs.max(1)),
        )?
        .with_temperature(config.generation.temperature);

        Ok(Self::new(
            Arc::new(retriever),
            Arc::new(synthesizer),
            config.generation.available_models.clone(),
            config.records_path.clone(),
        ))
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub fn synthesizer(&self) -> &Arc<Synthesizer> {
        &self.synthesizer
    }

    /// Answer one question. Invalid requests fail before any retrieval work.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, QueryFailure> {
        let k = request.validate()?;
        let started = Instant::now();

        info!(k, model = ?request.model, "Processing query");

        let retrieval = self.retriever.retrieve(&request.query, k).await?;
        let retrieved = retrieval.len();

        let answer = self
            .synthesizer
            .synthesize(&request.query, &retrieval, request.model.as_deref())
            .await
            .map_err(|error| {
                warn!(
                    error_class = error.kind(),
                    num_chunks_retrieved = retrieved,
                    "Generation failed after retrieval: {}",
                    error
                );
                QueryFailure {
                    error,
                    num_chunks_retrieved: Some(retrieved),
                }
            })?;

        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            model = %answer.model,
            num_chunks_retrieved = retrieved,
            processing_time_ms,
            "Query answered"
        );

        Ok(QueryResponse {
            query: request.query,
            answer: answer.text,
            relevant_chunks: retrieval.into_chunks(),
            num_chunks_retrieved: retrieved,
            processing_time_ms,
        })
    }

    pub fn health(&self) -> HealthReport {
        let status = self.retriever.status();
        HealthReport {
            status: if status.is_ready() { "ready" } else { "not ready" },
            state: status.state,
            detail: status.detail,
            num_chunks: status.num_chunks,
            embedding_model: status.embedding_model,
            generation_model: self.synthesizer.active_model(),
        }
    }

    pub fn models(&self) -> ModelList {
        ModelList {
            models: self.models.clone(),
            active: self.synthesizer.active_model(),
        }
    }

    pub async fn stats(&self) -> AppResult<RecordStats> {
        let path = self.records_path.clone();
        tokio::task::spawn_blocking(move || record_stats(&path))
            .await
            .map_err(|e| AppError::Other(format!("Stats task failed: {}", e)))?
    }
}
