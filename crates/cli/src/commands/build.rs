//! Build command handler.
//!
//! Turns the preprocessed records file into a persisted vector store.

use anyhow::Context;
use clap::Args;
use incidex_core::config::AppConfig;
use incidex_retrieval::vector_store::METADATA_FILE;
use incidex_retrieval::{
    content_hash, create_provider, is_fresh, load_records, BuildOptions, Chunker, ChunkerConfig,
    EmbeddingConfig, ProgressReporter, StoreMetadata, VectorStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Chunk, embed and index the incident records
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Records file (JSON array); defaults to the configured path
    #[arg(short, long)]
    pub records: Option<PathBuf>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunk overlap in characters
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Rebuild even when the stored index already matches the records
    #[arg(short, long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing build command");
        tracing::debug!("Build options: {:?}", self);

        let started = Instant::now();
        let records_path = self
            .records
            .clone()
            .unwrap_or_else(|| config.records_path.clone());
        let store_dir = &config.storage_dir;

        let reporter = if self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
        };

        let records = load_records(&records_path)?;
        reporter.load(records.len() as u64, &records_path.display().to_string());

        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: self.chunk_size.unwrap_or(config.chunking.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
        })?;

        let embedding = EmbeddingConfig::from_app_config(config);
        let provider = create_provider(&embedding).await?;

        let hash = content_hash(&chunker.chunk_all(&records), chunker.config());
        if !self.force && is_fresh(store_dir, &hash) {
            let stored = StoreMetadata::load(&store_dir.join(METADATA_FILE))?;
            if stored.embedding_model == provider.model_name()
                && stored.embedding_dim == provider.dimensions()
            {
                tracing::info!("Vector store at {:?} is up to date", store_dir);
                return self.report(&stored, &records_path, true, started);
            }
            tracing::info!(
                "Stored model {} differs from {}, rebuilding",
                stored.embedding_model,
                provider.model_name()
            );
        }

        let options = BuildOptions {
            batch_size: embedding.batch_size,
            timeout: embedding.timeout(),
        };
        let store = VectorStore::build(&records, &chunker, provider.as_ref(), options, &reporter)
            .await
            .context("failed to build vector store")?;

        let save_dir = store_dir.clone();
        let store = tokio::task::spawn_blocking(move || store.save(&save_dir).map(|_| store))
            .await
            .context("save task panicked")??;
        reporter.save(&store_dir.display().to_string());

        self.report(store.metadata(), &records_path, false, started)
    }

    fn report(
        &self,
        metadata: &StoreMetadata,
        records_path: &std::path::Path,
        skipped: bool,
        started: Instant,
    ) -> anyhow::Result<()> {
        let duration_secs = started.elapsed().as_secs_f64();

        if self.json {
            let output = serde_json::json!({
                "records": records_path,
                "numChunks": metadata.num_chunks,
                "embeddingProvider": metadata.embedding_provider,
                "embeddingModel": metadata.embedding_model,
                "embeddingDim": metadata.embedding_dim,
                "chunkSize": metadata.chunk_size,
                "chunkOverlap": metadata.chunk_overlap,
                "contentHash": metadata.content_hash,
                "builtAt": metadata.built_at.to_rfc3339(),
                "skipped": skipped,
                "durationSecs": duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if skipped {
            println!(
                "Vector store is up to date ({} chunks, model {}); use --force to rebuild",
                metadata.num_chunks, metadata.embedding_model
            );
        } else {
            println!(
                "Indexed {} chunks with {} ({} dims) in {:.2}s",
                metadata.num_chunks,
                metadata.embedding_model,
                metadata.embedding_dim,
                duration_secs
            );
        }

        Ok(())
    }
}
