//! Document chunking.
//!
//! [`RecursiveChunker`] cuts a document into overlapping windows of at most
//! `chunk_size` characters. Each window ends at the last paragraph break that
//! fits, else the last sentence end, else the last word boundary, and only
//! falls back to a hard cut when the window contains none of them. The next
//! window starts inside the tail of the previous one so that consecutive
//! chunks share between 1 and `chunk_overlap` characters.
//!
//! Chunk text is always an exact slice of the document. Dropping the shared
//! prefix of every chunk after the first and concatenating reproduces the
//! document.

use crate::config::RagConfig;
use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the ingester.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Separator levels in priority order: paragraph, sentence, word.
///
/// A chunk ends immediately after the separator, so the separator stays with
/// the preceding text.
const SEPARATOR_LEVELS: &[&[&str]] = &[
    &["\n\n"],
    &[". ", "! ", "? ", ".\n", "!\n", "?\n"],
    &[" ", "\n", "\t"],
];

/// A chunk's position in its document, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First character of the chunk.
    pub start: usize,
    /// One past the last character of the chunk.
    pub end: usize,
}

impl Span {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits text at natural boundaries with a bounded overlap.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk (at least 1)
    /// * `chunk_overlap` - maximum number of characters shared by consecutive
    ///   chunks, clamped below `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    /// Create a chunker from the configured sizes.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maximum overlap in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute chunk spans over `text`.
    pub fn spans(&self, text: &str) -> Vec<Span> {
        let offsets = char_offsets(text);
        let total = offsets.len() - 1;
        let mut spans = Vec::new();
        if total == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            let limit = start + self.chunk_size;
            if limit >= total {
                spans.push(Span { start, end: total });
                break;
            }
            let end = self.find_break(text, &offsets, start, limit);
            spans.push(Span { start, end });
            start = self.next_start(text, &offsets, start, end);
        }
        spans
    }

    /// Split `text` into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let offsets = char_offsets(text);
        self.spans(text)
            .into_iter()
            .map(|span| text[offsets[span.start]..offsets[span.end]].to_string())
            .collect()
    }

    /// Pick the end of the chunk starting at `start`.
    ///
    /// The end lies in `(start + chunk_overlap, limit]` so the following chunk
    /// can start after `start` while still overlapping this one.
    fn find_break(&self, text: &str, offsets: &[usize], start: usize, limit: usize) -> usize {
        let window_start = offsets[start + self.chunk_overlap];
        let window = &text[window_start..offsets[limit]];

        for level in SEPARATOR_LEVELS {
            let best = level
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
                .max();
            if let Some(rel) = best {
                return char_index(offsets, window_start + rel);
            }
        }
        limit
    }

    /// Pick where the chunk after `[start, end)` begins.
    ///
    /// Takes the earliest word start within the last `chunk_overlap`
    /// characters of the previous chunk, or a plain character cut if the tail
    /// holds no word start.
    fn next_start(&self, text: &str, offsets: &[usize], start: usize, end: usize) -> usize {
        if self.chunk_overlap == 0 {
            return end;
        }
        let lo = end.saturating_sub(self.chunk_overlap).max(start + 1);
        let tail = &text[offsets[lo - 1]..offsets[end]];
        let mut chars = tail.chars();
        let mut prev = chars.next();
        for (i, c) in chars.enumerate() {
            if prev.is_some_and(char::is_whitespace) && !c.is_whitespace() {
                return lo + i;
            }
            prev = Some(c);
        }
        lo
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let offsets = char_offsets(&document.text);
        self.spans(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                metadata.insert("start_index".to_string(), span.start.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: document.text[offsets[span.start]..offsets[span.end]].to_string(),
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

/// Byte offset of every character in `text`, followed by `text.len()`.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Character index of a byte offset that lies on a character boundary.
fn char_index(offsets: &[usize], byte: usize) -> usize {
    offsets.binary_search(&byte).unwrap_or_else(|i| i)
}
