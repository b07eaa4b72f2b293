//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] ties the two phases together. Ingestion loads the
//! documents, chunks them, embeds every chunk, appends the chunks to the
//! vector store and persists it. Querying retrieves the nearest chunks and
//! synthesizes an answer from them.
//!
//! # Example
//!
//! ```rust,ignore
//! use policy_rag::{RagPipeline, RagConfig, LocalVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(LocalVectorStore::open("./chroma_db").await?))
//!     .language_model(Arc::new(chat_model))
//!     .build()?;
//!
//! let report = pipeline.ingest().await?;
//! let result = pipeline.query("What is my deductible?").await?;
//! println!("{}", result.answer);
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, QueryResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::loader::{DirectoryLoader, LoadOutcome, SkippedFile};
use crate::retriever::Retriever;
use crate::retry::CallPolicy;
use crate::synthesizer::{AnswerSynthesizer, PromptTemplate};
use crate::vectorstore::VectorStore;

/// Number of chunk texts sent per embedding call during ingestion.
const EMBED_BATCH_SIZE: usize = 64;

/// Summary of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Identifier of this run, echoed in logs.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Documents that were chunked. A PDF contributes one per page.
    pub documents: usize,
    /// Chunks appended to the index.
    pub chunks: usize,
    /// Files that could not be loaded.
    pub skipped: Vec<SkippedFile>,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. A pipeline built without a
/// language model can ingest but not answer questions.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    loader: DirectoryLoader,
    retriever: Retriever,
    synthesizer: Option<AnswerSynthesizer>,
    policy: CallPolicy,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return the retriever used by [`query`](Self::query).
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Load every supported file under the configured `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadError`] if `data_dir` is not a directory.
    /// Individual unreadable files are skipped, not reported as errors.
    pub fn load_documents(&self) -> Result<LoadOutcome> {
        self.load_documents_from(&self.config.data_dir)
    }

    /// Load every supported file under `dir`.
    pub fn load_documents_from(&self, dir: &Path) -> Result<LoadOutcome> {
        let outcome = self.loader.load(dir)?;
        info!(
            dir = %dir.display(),
            documents = outcome.documents.len(),
            skipped = outcome.skipped.len(),
            "loaded documents"
        );
        Ok(outcome)
    }

    /// Ingest everything under the configured `data_dir`.
    ///
    /// Equivalent to [`load_documents`](Self::load_documents) followed by
    /// [`ingest_documents`](Self::ingest_documents).
    pub async fn ingest(&self) -> Result<IngestReport> {
        let LoadOutcome { documents, skipped } = self.load_documents()?;
        let mut report = self.ingest_documents(&documents).await?;
        report.skipped = skipped;
        Ok(report)
    }

    /// Chunk, embed, append and persist `documents`.
    ///
    /// Every chunk is embedded before anything is appended, so an embedding
    /// failure leaves the index exactly as it was. Stores drop the appended
    /// chunks again when persisting fails, so a later run never writes them.
    /// Re-ingesting the same documents appends duplicate entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestionFailed`] if embedding, appending, or
    /// persisting fails.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let mut chunks: Vec<Chunk> =
            documents.iter().flat_map(|document| self.chunker.chunk(document)).collect();
        info!(%run_id, documents = documents.len(), chunks = chunks.len(), "chunked documents");

        self.embed_chunks(&mut chunks).await.map_err(|e| {
            error!(%run_id, error = %e, "embedding failed during ingestion");
            RagError::IngestionFailed(format!("embedding failed: {e}"))
        })?;

        self.vector_store.add(&chunks).await.map_err(|e| {
            error!(%run_id, error = %e, "append failed during ingestion");
            RagError::IngestionFailed(format!("failed to append chunks: {e}"))
        })?;

        self.vector_store.persist().await.map_err(|e| {
            error!(%run_id, error = %e, "persist failed during ingestion");
            RagError::IngestionFailed(format!("failed to persist index: {e}"))
        })?;

        info!(%run_id, chunks = chunks.len(), "ingestion complete");
        Ok(IngestReport {
            run_id,
            started_at,
            documents: documents.len(),
            chunks: chunks.len(),
            skipped: Vec::new(),
        })
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        let total = chunks.len();
        for (batch_idx, batch) in chunks.chunks_mut(EMBED_BATCH_SIZE).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self
                .policy
                .run("document embedding", || self.embedding_provider.embed_batch(&texts))
                .await?;

            if embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.embedding_provider.name().to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
            let embedded = batch_idx * EMBED_BATCH_SIZE + batch.len();
            debug!(embedded, total, "embedded batch");
        }
        Ok(())
    }

    /// Answer `question` from the `top_k` most similar chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for a blank question or when the
    /// pipeline has no language model, and the retrieval or synthesis error
    /// otherwise. Nothing is retried beyond the configured [`CallPolicy`].
    pub async fn query(&self, question: &str) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(RagError::ConfigError("question must not be empty".to_string()));
        }
        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            RagError::ConfigError("a language model is required to answer questions".to_string())
        })?;

        let results = self.retriever.retrieve(question, self.config.top_k).await?;
        let result = synthesizer.answer(question, &results).await?;
        info!(source_count = result.sources.len(), "query completed");
        Ok(result)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, and `vector_store` are required. The
/// chunker defaults to a [`RecursiveChunker`] sized from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .language_model(Arc::new(model))  // needed for query
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    loader: Option<DirectoryLoader>,
    language_model: Option<Arc<dyn LanguageModel>>,
    template: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the directory loader.
    pub fn loader(mut self, loader: DirectoryLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the language model used to answer questions.
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Replace the default insurance prompt.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));

        let policy = CallPolicy::from_config(&config);
        let retriever = Retriever::new(embedding_provider.clone(), vector_store.clone())
            .with_policy(policy);
        let template = self.template.unwrap_or_default();
        let synthesizer = self.language_model.map(|model| {
            AnswerSynthesizer::new(model).with_template(template).with_policy(policy)
        });

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            loader: self.loader.unwrap_or_default(),
            retriever,
            synthesizer,
            policy,
        })
    }
}

