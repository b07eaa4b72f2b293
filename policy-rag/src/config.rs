//! Configuration for ingestion and query.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Prefix for environment overrides of [`RagConfig`] fields.
const ENV_PREFIX: &str = "POLICY_RAG_";

/// Configuration parameters for the RAG system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Directory scanned recursively for `*.pdf` and `*.txt` files at ingestion.
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector index.
    pub persist_dir: PathBuf,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Embedding model name. Must be the same at ingestion and query time.
    pub embedding_model: String,
    /// Chat completion model used to synthesize answers.
    pub chat_model: String,
    /// Sampling temperature for the chat model.
    pub temperature: f32,
    /// Upper bound on every embedding and language-model call.
    pub request_timeout: Duration,
    /// Retries after a transient embedding or language-model failure. Zero disables retry.
    pub max_retries: u32,
    /// Override for the OpenAI-compatible API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            persist_dir: PathBuf::from("./chroma_db"),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(60),
            max_retries: 0,
            api_base: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// A builder seeded with this configuration, for layering overrides.
    pub fn into_builder(self) -> RagConfigBuilder {
        RagConfigBuilder { config: self }
    }

    /// Build a configuration from the defaults overlaid with `POLICY_RAG_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut builder = RagConfig::builder();

        if let Some(dir) = var("DATA_DIR") {
            builder = builder.data_dir(dir);
        }
        if let Some(dir) = var("PERSIST_DIR") {
            builder = builder.persist_dir(dir);
        }
        if let Some(value) = var("CHUNK_SIZE") {
            builder = builder.chunk_size(parse_var("CHUNK_SIZE", &value)?);
        }
        if let Some(value) = var("CHUNK_OVERLAP") {
            builder = builder.chunk_overlap(parse_var("CHUNK_OVERLAP", &value)?);
        }
        if let Some(value) = var("TOP_K") {
            builder = builder.top_k(parse_var("TOP_K", &value)?);
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Some(model) = var("CHAT_MODEL") {
            builder = builder.chat_model(model);
        }
        if let Some(value) = var("TEMPERATURE") {
            builder = builder.temperature(parse_var("TEMPERATURE", &value)?);
        }
        if let Some(value) = var("TIMEOUT_SECS") {
            let secs = parse_var("TIMEOUT_SECS", &value)?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(value) = var("MAX_RETRIES") {
            builder = builder.max_retries(parse_var("MAX_RETRIES", &value)?);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            builder = builder.api_base(base);
        }

        builder.build()
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e| {
        RagError::ConfigError(format!("{ENV_PREFIX}{name}={value:?} is not valid: {e}"))
    })
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the document source directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the vector index directory.
    pub fn persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persist_dir = dir.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding model name.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chat model name.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the timeout applied to each external call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the number of retries for transient failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the API base URL.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is outside `0.0..=2.0`
    /// - `request_timeout` is zero
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                config.temperature
            )));
        }
        if config.request_timeout.is_zero() {
            return Err(RagError::ConfigError(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

/// The API credential shared by the embedding provider and the language model.
///
/// Read once at startup so that a missing key fails before any component is
/// constructed.
#[derive(Clone)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// Wrap an explicit key.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RagError::ConfigError(format!("{API_KEY_ENV} must not be empty")));
        }
        Ok(Self(key))
    }

    /// Read the key from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| {
            RagError::ConfigError(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        Self::new(key)
    }

    /// The raw key.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(****)")
    }
}
