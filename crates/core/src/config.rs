//! Configuration management for incidex.
//!
//! Configuration is layered, later layers winning:
//! - Built-in defaults
//! - YAML config file (`--config`, `INCIDEX_CONFIG`, or `./incidex.yaml`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "incidex.yaml";

/// Embedding providers the retrieval crate knows how to build.
pub const EMBEDDING_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Generation providers the llm crate knows how to build.
pub const GENERATION_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding chunks.json, the flat index and its sidecar
    pub storage_dir: PathBuf,

    /// Preprocessed incident records (JSON array)
    pub records_path: PathBuf,

    pub embedding: EmbeddingSettings,

    pub chunking: ChunkingSettings,

    pub generation: GenerationSettings,

    /// Optional YAML file overriding the answer prompt template
    pub prompt_file: Option<PathBuf>,

    /// Address the HTTP server binds to
    pub bind: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

/// Embedding capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// "ollama" or "mock"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Runtime base URL; falls back to the generation endpoint when unset
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

/// Chunker parameters, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Generation capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// "ollama" or "mock"
    pub provider: String,
    /// Default model identifier used when a request names none
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    /// Models offered to clients through the models listing
    pub available_models: Vec<String>,
}

/// Full configuration file structure. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    storage: Option<StorageSection>,
    embedding: Option<EmbeddingSection>,
    chunking: Option<ChunkingSection>,
    generation: Option<GenerationSection>,
    server: Option<ServerSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageSection {
    dir: Option<PathBuf>,
    records: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
    batch_size: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkingSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    models: Option<Vec<String>>,
    prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServerSection {
    bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: 100,
            timeout_secs: 30,
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "mistral".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            temperature: None,
            available_models: ["mistral", "llama2", "llama2:13b", "llama2:70b", "gemma:2b", "gemma:7b"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            storage_dir: PathBuf::from("data/vector_store"),
            records_path: PathBuf::from("data/processed_incidents.json"),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            generation: GenerationSettings::default(),
            prompt_file: None,
            bind: "127.0.0.1:8000".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment variables.
    ///
    /// Environment variables:
    /// - `INCIDEX_CONFIG`: Path to config file
    /// - `INCIDEX_STORAGE_DIR`: Vector store directory
    /// - `INCIDEX_RECORDS`: Preprocessed records file
    /// - `INCIDEX_EMBEDDING_PROVIDER`, `INCIDEX_EMBEDDING_MODEL`, `INCIDEX_EMBEDDING_DIM`
    /// - `INCIDEX_CHUNK_SIZE`, `INCIDEX_CHUNK_OVERLAP`
    /// - `INCIDEX_PROVIDER`, `INCIDEX_MODEL`: Generation provider and default model
    /// - `INCIDEX_OLLAMA_URL`: Ollama base URL
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use incidex_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Storage: {:?}", config.storage_dir);
    /// ```
    pub fn load(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        config.config_file = config_file.or_else(|| {
            std::env::var("INCIDEX_CONFIG").ok().map(PathBuf::from)
        });

        match config.config_file.clone() {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                config = config.merge_yaml(&path)?;
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    config = config.merge_yaml(&default_path)?;
                }
            }
        }

        config.merge_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn merge_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("INCIDEX_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(records) = lookup("INCIDEX_RECORDS") {
            self.records_path = PathBuf::from(records);
        }
        if let Some(provider) = lookup("INCIDEX_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(model) = lookup("INCIDEX_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dim) = lookup("INCIDEX_EMBEDDING_DIM") {
            self.embedding.dimensions = parse_number("INCIDEX_EMBEDDING_DIM", &dim)?;
        }
        if let Some(size) = lookup("INCIDEX_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_number("INCIDEX_CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = lookup("INCIDEX_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_number("INCIDEX_CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(provider) = lookup("INCIDEX_PROVIDER") {
            self.generation.provider = provider;
        }
        if let Some(model) = lookup("INCIDEX_MODEL") {
            self.generation.model = model;
        }
        if let Some(url) = lookup("INCIDEX_OLLAMA_URL") {
            self.generation.endpoint = url;
        }

        self.log_level = lookup("RUST_LOG").or(self.log_level.take());

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(storage) = config_file.storage {
            if let Some(dir) = storage.dir {
                result.storage_dir = dir;
            }
            if let Some(records) = storage.records {
                result.records_path = records;
            }
        }

        if let Some(embedding) = config_file.embedding {
            let e = &mut result.embedding;
            if let Some(provider) = embedding.provider {
                e.provider = provider;
            }
            if let Some(model) = embedding.model {
                e.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                e.dimensions = dimensions;
            }
            if embedding.endpoint.is_some() {
                e.endpoint = embedding.endpoint;
            }
            if let Some(batch_size) = embedding.batch_size {
                e.batch_size = batch_size;
            }
            if let Some(timeout) = embedding.timeout_secs {
                e.timeout_secs = timeout;
            }
        }

        if let Some(chunking) = config_file.chunking {
            if let Some(size) = chunking.chunk_size {
                result.chunking.chunk_size = size;
            }
            if let Some(overlap) = chunking.chunk_overlap {
                result.chunking.chunk_overlap = overlap;
            }
        }

        if let Some(generation) = config_file.generation {
            let g = &mut result.generation;
            if let Some(provider) = generation.provider {
                g.provider = provider;
            }
            if let Some(model) = generation.model {
                g.model = model;
            }
            if let Some(endpoint) = generation.endpoint {
                g.endpoint = endpoint;
            }
            if let Some(timeout) = generation.timeout_secs {
                g.timeout_secs = timeout;
            }
            if generation.temperature.is_some() {
                g.temperature = generation.temperature;
            }
            if let Some(models) = generation.models {
                g.available_models = models;
            }
            if generation.prompt_file.is_some() {
                result.prompt_file = generation.prompt_file;
            }
        }

        if let Some(server) = config_file.server {
            if let Some(bind) = server.bind {
                result.bind = bind;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        tracing::debug!("Merged config file {:?}", path);

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the config file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        storage_dir: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(storage_dir) = storage_dir {
            self.storage_dir = storage_dir;
        }

        if let Some(provider) = provider {
            self.generation.provider = provider;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Base URL of the embedding runtime.
    pub fn embedding_endpoint(&self) -> &str {
        self.embedding
            .endpoint
            .as_deref()
            .unwrap_or(&self.generation.endpoint)
    }

    /// Validate the assembled configuration.
    pub fn validate(&self) -> AppResult<()> {
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if !GENERATION_PROVIDERS.contains(&self.generation.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.generation.provider,
                GENERATION_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.embedding.timeout_secs == 0 || self.generation.timeout_secs == 0 {
            return Err(AppError::Config(
                "Timeouts must be at least one second".to_string(),
            ));
        }

        if self.generation.model.trim().is_empty() {
            return Err(AppError::Config(
                "Default generation model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> AppResult<usize> {
    value.trim().parse().map_err(|_| {
        AppError::Config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
