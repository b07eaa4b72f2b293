//! Data types for documents, chunks, search results, and answers.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// String key-value metadata. Ordered so rendering is stable.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key naming the file a document was loaded from.
pub const SOURCE_KEY: &str = "source";

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata; loaders always set [`SOURCE_KEY`].
    pub metadata: Metadata,
}

impl Document {
    /// Create a document whose `source` metadata is set to `source`.
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self { id: id.into(), text: text.into(), metadata }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata value, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until the ingester embeds it.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Metadata inherited from the parent document plus `chunk_index` and `start_index`.
    pub metadata: Metadata,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A chunk returned alongside an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// The chunk text, verbatim.
    pub content: String,
    /// The chunk metadata.
    pub metadata: Metadata,
}

impl From<&Chunk> for Source {
    fn from(chunk: &Chunk) -> Self {
        Self { content: chunk.text.clone(), metadata: chunk.metadata.clone() }
    }
}

/// The answer to one question plus the chunks it was synthesized from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    /// The model's raw answer text.
    pub answer: String,
    /// The chunks placed in the prompt, in retrieval order.
    pub sources: Vec<Source>,
}

impl QueryResult {
    /// Render the sources as numbered `Source N:` blocks.
    ///
    /// Returns an empty string when there are no sources.
    pub fn format_sources(&self) -> String {
        let mut out = String::new();
        for (idx, source) in self.sources.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            let metadata = source
                .metadata
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(
                out,
                "Source {}:\nContent: {}\nMetadata: {{{metadata}}}\n",
                idx + 1,
                source.content
            );
        }
        out
    }
}
