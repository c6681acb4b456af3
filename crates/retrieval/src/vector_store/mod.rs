//! Paired chunk store and vector index.
//!
//! A `VectorStore` is the only way to get at a `ChunkStore`/`FlatIndex` pair,
//! and it can only be produced by [`VectorStore::build`] (one ordered pass
//! from records to index) or [`VectorStore::load`] (which checks the pair
//! agrees). Chunk id `i` is always index id `i`.

mod metadata;

pub use metadata::{content_hash, is_fresh, StoreMetadata, METADATA_FILE};

use crate::chunk::Chunker;
use crate::embeddings::{embed_texts, EmbeddingProvider};
use crate::progress::ProgressReporter;
use crate::record::IncidentRecord;
use crate::store::{ChunkStore, CHUNKS_FILE};
use crate::vector_index::{FlatIndex, INDEX_FILE};
use chrono::Utc;
use incidex_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Embedding call parameters for a build.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    chunks: ChunkStore,
    index: FlatIndex,
    metadata: StoreMetadata,
}

impl VectorStore {
    /// Chunk, embed and index `records` in order.
    ///
    /// An empty corpus, or one that renders to no chunks, is rejected.
    pub async fn build(
        records: &[IncidentRecord],
        chunker: &Chunker,
        provider: &dyn EmbeddingProvider,
        options: BuildOptions,
        progress: &ProgressReporter,
    ) -> AppResult<Self> {
        if records.is_empty() {
            return Err(AppError::InvalidArgument(
                "Cannot build a vector store from zero records".to_string(),
            ));
        }

        let total_records = records.len() as u64;
        let mut chunks = Vec::new();
        for (i, record) in records.iter().enumerate() {
            chunks.extend(chunker.chunk(record));
            if (i + 1) % 100 == 0 || i + 1 == records.len() {
                progress.chunk((i + 1) as u64, total_records, chunks.len());
            }
        }
        tracing::info!(
            "Chunked {} records into {} chunks",
            records.len(),
            chunks.len()
        );

        let hash = content_hash(&chunks, chunker.config());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let batch_size = options.batch_size.max(1);
        let total_texts = texts.len() as u64;
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(embed_texts(provider, batch, batch_size, options.timeout).await?);
            progress.embed(vectors.len() as u64, total_texts, provider.model_name());
        }

        let index = FlatIndex::build(provider.dimensions(), &vectors)?;
        progress.index(index.len() as u64, index.dimension());

        let config = chunker.config();
        let metadata = StoreMetadata {
            embedding_model: provider.model_name().to_string(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            num_chunks: chunks.len(),
            embedding_dim: index.dimension(),
            embedding_provider: provider.provider_name().to_string(),
            content_hash: hash,
            built_at: Utc::now(),
        };

        let mut store = ChunkStore::new();
        store.put_all(chunks)?;

        Ok(Self {
            chunks: store,
            index,
            metadata,
        })
    }

    /// Load a persisted store and check the index, chunks and sidecar agree.
    pub fn load(dir: &Path) -> AppResult<Self> {
        if !dir.is_dir() {
            return Err(AppError::ResourceLoad(format!(
                "missing vector store directory {}",
                dir.display()
            )));
        }

        let metadata = StoreMetadata::load(&dir.join(METADATA_FILE))?;
        let chunks = ChunkStore::load(&dir.join(CHUNKS_FILE))?;
        let index = FlatIndex::load(&dir.join(INDEX_FILE))?;

        if chunks.len() != index.len() || index.len() != metadata.num_chunks {
            return Err(AppError::ResourceLoad(format!(
                "malformed vector store {}: {} chunks, {} vectors, sidecar records {}",
                dir.display(),
                chunks.len(),
                index.len(),
                metadata.num_chunks
            )));
        }
        if index.dimension() != metadata.embedding_dim {
            return Err(AppError::ResourceLoad(format!(
                "malformed vector store {}: index dimension {}, sidecar records {}",
                dir.display(),
                index.dimension(),
                metadata.embedding_dim
            )));
        }

        tracing::info!(
            "Loaded vector store from {} ({} chunks, dim {}, model {})",
            dir.display(),
            chunks.len(),
            index.dimension(),
            metadata.embedding_model
        );

        Ok(Self {
            chunks,
            index,
            metadata,
        })
    }

    /// Persist all three files, replacing any previous store in `dir` as a
    /// unit.
    pub fn save(&self, dir: &Path) -> AppResult<()> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "Store directory {} has no final component",
                    dir.display()
                ))
            })?;
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let tag = uuid::Uuid::new_v4().simple().to_string();
        let staging = parent.join(format!(".{}.staging-{}", name, tag));
        std::fs::create_dir(&staging)?;

        if let Err(e) = self.write_files(&staging) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        let backup = parent.join(format!(".{}.backup-{}", name, tag));
        replace_dir(&staging, dir, &backup)?;

        tracing::info!(
            "Saved vector store to {} ({} chunks)",
            dir.display(),
            self.len()
        );
        Ok(())
    }

    fn write_files(&self, dir: &Path) -> AppResult<()> {
        self.chunks.save(&dir.join(CHUNKS_FILE))?;
        self.index.save(&dir.join(INDEX_FILE))?;
        self.metadata.save(&dir.join(METADATA_FILE))?;
        Ok(())
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Move `staging` into place at `dir`, keeping the previous contents at
/// `backup` until the swap succeeds. `staging` never outlives a failure.
fn replace_dir(staging: &Path, dir: &Path, backup: &Path) -> AppResult<()> {
    let had_previous = dir.exists();
    if had_previous {
        if let Err(e) = std::fs::rename(dir, backup) {
            let _ = std::fs::remove_dir_all(staging);
            return Err(e.into());
        }
    }

    if let Err(e) = std::fs::rename(staging, dir) {
        if had_previous {
            let _ = std::fs::rename(backup, dir);
        }
        let _ = std::fs::remove_dir_all(staging);
        return Err(e.into());
    }

    if had_previous {
        if let Err(e) = std::fs::remove_dir_all(backup) {
            tracing::warn!("Failed to remove backup {}: {}", backup.display(), e);
        }
    }
    Ok(())
}
