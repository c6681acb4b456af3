//! Retrieval-augmented answering: retrieval result types and the answer
//! synthesizer.

pub mod synthesizer;
pub mod types;

pub use synthesizer::{Generator, Synthesizer};
pub use types::{Answer, RetrievalResult, RetrievedChunk};
