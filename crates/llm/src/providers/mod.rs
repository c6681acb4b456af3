//! Generation client implementations.

pub mod mock;
pub mod ollama;

pub use mock::{MockBehavior, MockLlmClient};
pub use ollama::OllamaClient;
