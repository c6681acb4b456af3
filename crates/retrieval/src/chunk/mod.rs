//! Splits rendered incident records into bounded, overlapping chunks.
//!
//! Splitting is delegated to the `text-splitter` crate with a character sizer.
//! It prefers the largest semantic boundary that fits (paragraphs, line
//! breaks, sentences, words, graphemes, then single characters), so no chunk
//! ever exceeds `chunk_size` characters, even for an indivisible token.

mod render;

pub use render::{render_record, RENDERED_FIELDS};

use crate::record::IncidentRecord;
use incidex_core::config::ChunkingSettings;
use incidex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use text_splitter::{ChunkConfig, TextSplitter};

/// A bounded text unit derived from one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Back-reference from a chunk to where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_record_id: i64,
    /// Position of the chunk within its record, starting at 0.
    pub sequence_index: u32,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_record_id: i64, sequence_index: u32) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source_record_id,
                sequence_index,
            },
        }
    }
}

/// Chunk size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl From<ChunkingSettings> for ChunkerConfig {
    fn from(settings: ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// Deterministic record chunker.
pub struct Chunker {
    config: ChunkerConfig,
    splitter: TextSplitter<text_splitter::Characters>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker").field("config", &self.config).finish()
    }
}

impl Chunker {
    /// Build a chunker, rejecting `chunk_size == 0` and
    /// `chunk_overlap >= chunk_size`.
    pub fn new(config: ChunkerConfig) -> AppResult<Self> {
        if config.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        let splitter_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk configuration: {}", e)))?
            .with_trim(true);

        Ok(Self {
            config,
            splitter: TextSplitter::new(splitter_config),
        })
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Chunk one record. A record always yields at least one chunk because
    /// its rendering always carries the id line.
    pub fn chunk(&self, record: &IncidentRecord) -> Vec<Chunk> {
        let rendered = render_record(record);

        let chunks: Vec<Chunk> = self
            .splitter
            .chunks(&rendered)
            .filter(|text| !text.trim().is_empty())
            .enumerate()
            .map(|(sequence_index, text)| Chunk::new(text, record.id, sequence_index as u32))
            .collect();

        tracing::trace!(
            record_id = record.id,
            chunks = chunks.len(),
            rendered_chars = rendered.chars().count(),
            "Chunked record"
        );

        chunks
    }

    /// Chunk a whole corpus: record order, then sequence order.
    ///
    /// The resulting order is the id order of both the chunk store and the
    /// vector index.
    pub fn chunk_all(&self, records: &[IncidentRecord]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = records.iter().flat_map(|record| self.chunk(record)).collect();

        tracing::debug!(
            "Chunker created {} chunks from {} records (size {}, overlap {})",
            chunks.len(),
            records.len(),
            self.config.chunk_size,
            self.config.chunk_overlap
        );

        chunks
    }
}
