//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for embedded chunks with similarity search.
///
/// Writes are append-only: adding a chunk that is already stored creates a
/// second entry. There is no update or delete.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.add(&chunks).await?;
/// let results = store.search(&query_embedding, 4).await?;
/// store.persist().await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append chunks to the store. Chunks must have embeddings set.
    async fn add(&self, chunks: &[Chunk]) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns at most `top_k` results ordered by descending similarity
    /// score. Equal scores keep insertion order, so repeated searches over an
    /// unchanged store return identical results.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Flush appended chunks to durable storage. No-op for volatile stores.
    ///
    /// On failure, chunks appended since the last successful persist are
    /// discarded.
    async fn persist(&self) -> Result<()>;

    /// Number of stored chunks.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no chunks.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score every chunk against `embedding` and keep the `top_k` best.
///
/// The sort is stable, so ties keep the order of `chunks`. A NaN similarity
/// ranks below every real score.
pub(crate) fn rank<'a>(
    chunks: impl IntoIterator<Item = &'a Chunk>,
    embedding: &[f32],
    top_k: usize,
) -> Vec<SearchResult> {
    let mut scored: Vec<SearchResult> = chunks
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(&chunk.embedding, embedding);
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
            SearchResult { chunk: chunk.clone(), score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            text: id.into(),
            embedding,
            metadata: Default::default(),
            document_id: "doc".into(),
        }
    }

    #[test]
    fn nan_embeddings_rank_last() {
        let chunks = [
            chunk("nan", vec![f32::NAN, 1.0]),
            chunk("near", vec![1.0, 0.0]),
            chunk("nan2", vec![1.0, f32::NAN]),
            chunk("far", vec![-1.0, 0.0]),
        ];
        let results = rank(chunks.iter(), &[1.0, 0.0], 4);
        let ids: Vec<_> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["near", "far", "nan", "nan2"]);
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }
}
