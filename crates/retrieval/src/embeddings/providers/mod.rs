//! Embedding provider implementations.

pub mod mock;
pub mod ollama;

pub use mock::{MockProvider, MOCK_MODEL};
pub use ollama::OllamaProvider;
