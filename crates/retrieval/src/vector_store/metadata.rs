//! Sidecar metadata describing how a persisted store was built.

use crate::chunk::{Chunk, ChunkerConfig};
use chrono::{DateTime, Utc};
use incidex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// File name of the sidecar inside a store directory.
pub const METADATA_FILE: &str = "embedding_metadata.json";

/// Written next to the index and chunk store on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub num_chunks: usize,
    pub embedding_dim: usize,
    pub embedding_provider: String,
    /// SHA-256 over chunk parameters and chunk texts.
    pub content_hash: String,
    pub built_at: DateTime<Utc>,
}

impl StoreMetadata {
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ResourceLoad(format!(
                    "missing store metadata {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(AppError::ResourceLoad(format!(
                    "unreadable store metadata {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&json).map_err(|e| {
            AppError::ResourceLoad(format!(
                "malformed store metadata {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Hash identifying a chunked corpus under the given chunk parameters.
pub fn content_hash(chunks: &[Chunk], config: ChunkerConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}\n", config.chunk_size, config.chunk_overlap).as_bytes());
    for chunk in chunks {
        hasher.update(chunk.metadata.source_record_id.to_le_bytes());
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Whether the store in `dir` was built from content hashing to `hash`.
///
/// A missing or unreadable sidecar counts as stale.
pub fn is_fresh(dir: &Path, hash: &str) -> bool {
    match StoreMetadata::load(&dir.join(METADATA_FILE)) {
        Ok(metadata) => metadata.content_hash == hash,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> StoreMetadata {
        StoreMetadata {
            embedding_model: "all-minilm".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            num_chunks: 3,
            embedding_dim: 384,
            embedding_provider: "ollama".to_string(),
            content_hash: "abc123".to_string(),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        let metadata = sample();
        metadata.save(&path).unwrap();
        assert_eq!(StoreMetadata::load(&path).unwrap(), metadata);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"embedding_model\": \"all-minilm\""));
        assert!(raw.contains("\"embedding_dim\": 384"));
    }

    #[test]
    fn test_is_fresh() {
        let dir = tempdir().unwrap();
        assert!(!is_fresh(dir.path(), "abc123"));

        sample().save(&dir.path().join(METADATA_FILE)).unwrap();
        assert!(is_fresh(dir.path(), "abc123"));
        assert!(!is_fresh(dir.path(), "other"));
    }

    #[test]
    fn test_content_hash_tracks_parameters_and_text() {
        let chunks = vec![Chunk::new("Incident ID: 1\nType: Flood", 1, 0)];
        let base = content_hash(&chunks, ChunkerConfig::default());

        assert_eq!(base, content_hash(&chunks, ChunkerConfig::default()));
        assert_ne!(
            base,
            content_hash(
                &chunks,
                ChunkerConfig {
                    chunk_size: 500,
                    chunk_overlap: 100
                }
            )
        );

        let edited = vec![Chunk::new("Incident ID: 1\nType: Landslide", 1, 0)];
        assert_ne!(base, content_hash(&edited, ChunkerConfig::default()));
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);
        std::fs::write(&path, "not valid json").unwrap();
        let err = StoreMetadata::load(&path).unwrap_err();
        assert!(matches!(err, AppError::ResourceLoad(ref m) if m.contains("malformed")));
    }
}
