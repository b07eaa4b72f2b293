//! # policy-rag
//!
//! Retrieval-augmented question answering over insurance policy documents.
//!
//! ## Overview
//!
//! Ingestion turns a directory of PDF and text files into a persisted vector
//! index:
//!
//! - [`DirectoryLoader`] reads the files (one document per PDF page)
//! - [`RecursiveChunker`] cuts them into overlapping chunks
//! - an [`EmbeddingProvider`] embeds every chunk
//! - a [`VectorStore`] appends and persists them
//!
//! Querying embeds the question, retrieves the `top_k` nearest chunks with
//! the [`Retriever`], and asks a [`LanguageModel`] to answer from them via
//! the [`AnswerSynthesizer`]. The [`QueryResult`] carries the answer and the
//! exact chunks the model saw.
//!
//! [`RagPipeline`] wires all of this together.
//!
//! ## Features
//!
//! - `openai` (default): [`OpenAIEmbeddingProvider`] and [`OpenAIChatModel`]

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod llm;
pub mod loader;
pub mod local;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod synthesizer;
pub mod vectorstore;

pub use chunking::{Chunker, RecursiveChunker, Span};
pub use config::{API_KEY_ENV, ApiCredential, RagConfig, RagConfigBuilder};
pub use context::{CONTEXT_DELIMITER, assemble};
pub use document::{Chunk, Document, Metadata, QueryResult, SOURCE_KEY, SearchResult, Source};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use llm::LanguageModel;
pub use loader::{DirectoryLoader, DocumentLoader, LoadOutcome, PdfLoader, SkippedFile, TextLoader};
pub use local::{INDEX_FILE, LocalVectorStore};
pub use mock::{HashEmbeddingProvider, MockLanguageModel};
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
pub use pipeline::{IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use retry::CallPolicy;
pub use synthesizer::{AnswerSynthesizer, DEFAULT_TEMPLATE, PromptTemplate};
pub use vectorstore::VectorStore;
