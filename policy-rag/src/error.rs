//! Error types for the `policy-rag` crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A document could not be read or parsed.
    #[error("Load error ({}): {message}", path.display())]
    LoadError {
        /// The file that failed to load.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index is unreachable, corrupt, or rejected a write.
    #[error("Index error ({backend}): {message}")]
    IndexError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed or returned an unusable response.
    #[error("Synthesis error ({model}): {message}")]
    SynthesisError {
        /// The language model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingestion was aborted and the index was left untouched.
    #[error("Ingestion failed: {0}")]
    IngestionFailed(String),

    /// An external call did not complete within the configured timeout.
    #[error("{operation} timed out after {}s", after.as_secs_f32())]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that elapsed.
        after: Duration,
    },
}

impl RagError {
    /// Whether the failure is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::Timeout { .. }
                | RagError::EmbeddingError { .. }
                | RagError::SynthesisError { .. }
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
