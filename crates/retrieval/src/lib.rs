//! Incident retrieval and grounded answering.
//!
//! Records are rendered and chunked, embedded into a flat vector index, and
//! persisted alongside a positional chunk store. At query time the
//! [`Retriever`] lazily loads that store, finds the nearest chunks, and the
//! [`Synthesizer`] asks a generation model to answer from them.

pub mod chunk;
pub mod embeddings;
pub mod progress;
pub mod rag;
pub mod record;
pub mod retriever;
pub mod service;
pub mod stats;
pub mod store;
pub mod vector_index;
pub mod vector_store;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkMetadata, Chunker, ChunkerConfig};
pub use embeddings::{
    create_provider, DefaultProviderFactory, EmbeddingConfig, EmbeddingProvider,
    EmbeddingProviderFactory,
};
pub use progress::{BuildPhase, ProgressEvent, ProgressReporter};
pub use rag::{Answer, RetrievalResult, RetrievedChunk, Synthesizer};
pub use record::{load_records, IncidentRecord};
pub use retriever::{ReadyState, Retriever, RetrieverStatus};
pub use service::{HealthReport, ModelList, QueryFailure, QueryRequest, QueryResponse, QueryService};
pub use stats::{record_stats, RecordStats};
pub use store::ChunkStore;
pub use vector_index::FlatIndex;
pub use vector_store::{content_hash, is_fresh, BuildOptions, StoreMetadata, VectorStore};
