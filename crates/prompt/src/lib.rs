//! Prompt templates for incidex.
//!
//! - A built-in grounded-answer template for incident questions
//! - YAML template overrides
//! - Handlebars rendering (strict, no HTML escaping)

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_answer_prompt, validate_template};
pub use loader::{load_template, resolve_template};
pub use types::{PromptTemplate, CONTEXT_VAR, INSUFFICIENT_INFORMATION, QUESTION_VAR};
