//! Text generation integration for incidex.
//!
//! A provider-agnostic abstraction over generation runtimes.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Mock**: Deterministic in-process client for tests and offline runs
//!
//! # Example
//! ```no_run
//! use incidex_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("How many floods were reported?", "mistral");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse};
pub use factory::{create_client, ClientFactory, ProviderClientFactory};
pub use providers::{MockBehavior, MockLlmClient, OllamaClient};
pub use types::ProviderType;
