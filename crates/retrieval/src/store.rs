//! Positional chunk store: chunk id `i` is the `i`-th chunk written.

use crate::chunk::Chunk;
use incidex_core::{AppError, AppResult};
use std::path::Path;

/// File name of the persisted chunk store inside a store directory.
pub const CHUNKS_FILE: &str = "chunks.json";

/// Write-once, read-many chunk storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill an empty store. A second fill is rejected.
    pub fn put_all(&mut self, chunks: Vec<Chunk>) -> AppResult<()> {
        if !self.chunks.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "Chunk store already holds {} chunks",
                self.chunks.len()
            )));
        }
        self.chunks = chunks;
        Ok(())
    }

    pub fn get(&self, id: usize) -> AppResult<&Chunk> {
        self.chunks.get(id).ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "Chunk id {} out of range (store holds {})",
                id,
                self.chunks.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(&self.chunks)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ResourceLoad(format!(
                    "missing chunk store {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(AppError::ResourceLoad(format!(
                    "unreadable chunk store {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let chunks: Vec<Chunk> = serde_json::from_str(&content).map_err(|e| {
            AppError::ResourceLoad(format!(
                "malformed chunk store {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self { chunks })
    }
}
