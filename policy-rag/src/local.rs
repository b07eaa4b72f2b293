//! Persistent vector store backed by a JSON file.
//!
//! [`LocalVectorStore`] keeps every entry in memory and writes the whole set
//! to `<dir>/index.json` on [`persist`](VectorStore::persist). Writes go to a
//! temporary file that is renamed over the index, so a crash or an aborted
//! ingestion leaves the previous index intact. A failed persist also drops
//! the entries appended since the last successful one, keeping memory and
//! disk in step.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, rank};

/// File name of the index inside the persist directory.
pub const INDEX_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;
const BACKEND: &str = "Local";

#[derive(Debug, Deserialize)]
struct IndexFile {
    version: u32,
    /// Embedding size shared by every entry; `None` while the index is empty.
    dimensions: Option<usize>,
    entries: Vec<Chunk>,
}

#[derive(Serialize)]
struct IndexSnapshot<'a> {
    version: u32,
    dimensions: Option<usize>,
    entries: &'a [Chunk],
}

#[derive(Debug, Default)]
struct State {
    dimensions: Option<usize>,
    entries: Vec<Chunk>,
    persisted: usize,
}

/// A vector store persisted to a directory on disk.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::{LocalVectorStore, VectorStore};
///
/// let store = LocalVectorStore::open("./chroma_db").await?;
/// store.add(&chunks).await?;
/// store.persist().await?;
/// ```
#[derive(Debug)]
pub struct LocalVectorStore {
    dir: PathBuf,
    state: RwLock<State>,
}

impl LocalVectorStore {
    /// Open the index in `dir`.
    ///
    /// A missing directory or index file yields an empty store; nothing is
    /// written until [`persist`](VectorStore::persist) is called.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the index file exists but cannot
    /// be read or parsed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: IndexFile = serde_json::from_slice(&bytes).map_err(|e| {
                    error!(path = %path.display(), error = %e, "index file is corrupt");
                    index_error(format!("failed to parse {}: {e}", path.display()))
                })?;
                if file.version != FORMAT_VERSION {
                    return Err(index_error(format!(
                        "unsupported index version {} in {}",
                        file.version,
                        path.display()
                    )));
                }
                info!(path = %path.display(), entries = file.entries.len(), "opened index");
                State {
                    dimensions: file.dimensions,
                    persisted: file.entries.len(),
                    entries: file.entries,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no index on disk, starting empty");
                State::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read index");
                return Err(index_error(format!("failed to read {}: {e}", path.display())));
            }
        };

        Ok(Self { dir, state: RwLock::new(state) })
    }

    /// The persist directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Embedding size of the stored entries, if any are stored.
    pub async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }

    /// Number of entries added since the last successful persist.
    pub async fn pending(&self) -> usize {
        let state = self.state.read().await;
        state.entries.len() - state.persisted
    }
}

fn index_error(message: String) -> RagError {
    RagError::IndexError { backend: BACKEND.to_string(), message }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.state.write().await;

        let mut dimensions = state.dimensions;
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(index_error(format!("chunk '{}' has no embedding", chunk.id)));
            }
            match dimensions {
                Some(expected) if expected != chunk.embedding.len() => {
                    return Err(index_error(format!(
                        "chunk '{}' has {} dimensions, index holds {expected}",
                        chunk.id,
                        chunk.embedding.len()
                    )));
                }
                Some(_) => {}
                None => dimensions = Some(chunk.embedding.len()),
            }
        }

        state.dimensions = dimensions;
        state.entries.extend_from_slice(chunks);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;
        if let Some(expected) = state.dimensions {
            if expected != embedding.len() {
                return Err(index_error(format!(
                    "query has {} dimensions, index holds {expected}",
                    embedding.len()
                )));
            }
        }
        Ok(rank(state.entries.iter(), embedding, top_k))
    }

    async fn persist(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let path = self.index_path();
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));

        let snapshot = IndexSnapshot {
            version: FORMAT_VERSION,
            dimensions: state.dimensions,
            entries: &state.entries,
        };
        let encoded = serde_json::to_vec(&snapshot)
            .map_err(|e| index_error(format!("failed to encode index: {e}")))?;

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, &encoded).await?;
            tokio::fs::rename(&tmp, &path).await
        };
        if let Err(e) = write.await {
            let discarded = state.entries.len() - state.persisted;
            error!(path = %path.display(), error = %e, discarded, "failed to persist index");
            let persisted = state.persisted;
            state.entries.truncate(persisted);
            if persisted == 0 {
                state.dimensions = None;
            }
            return Err(index_error(format!("failed to write {}: {e}", path.display())));
        }

        state.persisted = state.entries.len();
        info!(path = %path.display(), entries = state.persisted, "persisted index");
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().await.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), format!("data/{id}.txt"));
        Chunk {
            id: id.into(),
            text: format!("text of {id}"),
            embedding,
            metadata,
            document_id: id.into(),
        }
    }

    #[tokio::test]
    async fn missing_directory_opens_empty_without_writing() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("chroma_db");
        let store = LocalVectorStore::open(&dir).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 4).await.unwrap().is_empty());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(temp.path()).await.unwrap();
        store.add(&[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.pending().await, 2);
        store.persist().await.unwrap();
        assert_eq!(store.pending().await, 0);
        assert!(!temp.path().join("index.json.tmp").exists());

        let reopened = LocalVectorStore::open(temp.path()).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        assert_eq!(reopened.dimensions().await, Some(2));
        let results = reopened.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].chunk, chunk("b", vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn unpersisted_entries_are_lost() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(temp.path()).await.unwrap();
        store.add(&[chunk("a", vec![1.0])]).await.unwrap();
        drop(store);

        let reopened = LocalVectorStore::open(temp.path()).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_persist_discards_pending_entries() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("chroma_db");
        let store = LocalVectorStore::open(&dir).await.unwrap();
        store.add(&[chunk("a", vec![1.0, 0.0])]).await.unwrap();
        // A plain file where the directory should be makes the write fail.
        std::fs::write(&dir, b"").unwrap();

        let err = store.persist().await.unwrap_err();
        assert!(matches!(err, RagError::IndexError { .. }));
        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(store.pending().await, 0);
        assert_eq!(store.dimensions().await, None);

        std::fs::remove_file(&dir).unwrap();
        store.add(&[chunk("b", vec![0.0, 1.0, 0.0])]).await.unwrap();
        store.persist().await.unwrap();
        let reopened = LocalVectorStore::open(&dir).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        assert_eq!(reopened.dimensions().await, Some(3));
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(temp.path()).await.unwrap();
        store.add(&[chunk("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store.add(&[chunk("b", vec![1.0, 0.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::IndexError { .. }));
        assert_eq!(store.len().await.unwrap(), 1);

        assert!(store.search(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_index_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(INDEX_FILE), b"{not json").unwrap();
        let err = LocalVectorStore::open(temp.path()).await.unwrap_err();
        assert!(matches!(err, RagError::IndexError { backend, .. } if backend == "Local"));
    }
}
