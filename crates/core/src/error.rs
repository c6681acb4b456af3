//! Error types for incidex.
//!
//! A single error enum covers every failure class the pipeline can surface:
//! configuration, resource loading, provider initialization, argument
//! validation, generation and timeouts.

use thiserror::Error;

/// Unified error type for incidex.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or inconsistent configuration (chunk parameters, providers, templates).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The retriever is not in the Ready state.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Persisted index, chunk store or sidecar is missing or malformed.
    #[error("Resource load error: {0}")]
    ResourceLoad(String),

    /// An embedding or generation capability could not be created.
    #[error("Provider initialization error: {0}")]
    ProviderInit(String),

    /// Caller supplied an argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The generation capability failed or produced no answer.
    #[error("Generation error: {0}")]
    Generation(String),

    /// An external call exceeded its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Transport-level failure talking to a model runtime.
    #[error("LLM error: {0}")]
    Llm(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable, machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::NotReady(_) => "not_ready",
            AppError::ResourceLoad(_) => "resource_load_error",
            AppError::ProviderInit(_) => "provider_init_error",
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::Generation(_) => "generation_error",
            AppError::Timeout(_) => "timeout",
            AppError::Llm(_) => "llm_error",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Other(_) => "error",
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::Llm(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            AppError::InvalidArgument("k".into()).kind(),
            "invalid_argument"
        );
        assert_eq!(AppError::NotReady("x".into()).kind(), "not_ready");
        assert_eq!(AppError::Timeout("x".into()).kind(), "timeout");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Timeout("generation".into()).is_retryable());
        assert!(AppError::Llm("connection reset".into()).is_retryable());
        assert!(!AppError::Generation("empty answer".into()).is_retryable());
        assert!(!AppError::InvalidArgument("k".into()).is_retryable());
    }

    #[test]
    fn test_display_prefix() {
        let err = AppError::Config("chunk_overlap must be smaller".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: chunk_overlap must be smaller"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(err.kind(), "serialization_error");
    }
}
