//! Context assembly.

use crate::document::SearchResult;

/// Delimiter placed between chunk texts.
pub const CONTEXT_DELIMITER: &str = "\n\n";

/// Join the retrieved chunk texts, in ranking order, with a blank line.
///
/// No deduplication, reordering, or truncation happens here; the number of
/// chunks is bounded by the retrieval `k` alone.
pub fn assemble(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_DELIMITER)
}
