//! Query-time retrieval: embed the question, fetch the nearest chunks.

use std::sync::Arc;

use tracing::{debug, error};

use crate::context::assemble;
use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retry::CallPolicy;
use crate::vectorstore::VectorStore;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Fetches the chunks most similar to a query.
///
/// The embedding provider must be the one the index was built with; the
/// retriever does not check this.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    policy: CallPolicy,
}

impl Retriever {
    /// Create a retriever over `vector_store`.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { embedding_provider, vector_store, policy: CallPolicy::default() }
    }

    /// Set the timeout/retry policy for the query embedding call.
    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Return the `k` chunks most similar to `query` with their scores,
    /// most similar first.
    ///
    /// An empty index yields an empty result; `k` larger than the index
    /// returns every entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0`, and embedding or index
    /// errors from the collaborators.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be at least 1".to_string()));
        }

        let embedding = self
            .policy
            .run("query embedding", || self.embedding_provider.embed(query))
            .await
            .map_err(|e| {
                error!(error = %e, "embedding failed during query");
                e
            })?;

        let results = self.vector_store.search(&embedding, k).await.map_err(|e| {
            error!(error = %e, "vector store search failed");
            e
        })?;

        debug!(k, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Like [`retrieve`](Self::retrieve) without the scores.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self.retrieve(query, k).await?.into_iter().map(|r| r.chunk).collect())
    }

    /// Alias of [`retrieve`](Self::retrieve).
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.retrieve(query, k).await
    }

    /// Retrieve and assemble the context string for `query`.
    pub async fn relevant_context(&self, query: &str, k: usize) -> Result<String> {
        Ok(assemble(&self.retrieve(query, k).await?))
    }

    /// The underlying vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }
}
