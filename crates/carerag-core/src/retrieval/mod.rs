//! CareRAG Retrieval Module
//!
//! Grounding context for report generation and report Q&A.
//!
//! ## Features
//!
//! - Fixed-window and paragraph chunking
//! - Pluggable embedders, with an OpenAI / Azure OpenAI client
//! - Exact (brute-force) Euclidean search over fixed-width vectors
//! - Crash-safe snapshot persistence for the reference corpus
//! - Per-report index with atomic replacement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use carerag_core::retrieval::{CorpusIndexStore, EmbeddingClient, RetrievalConfig};
//!
//! let config = RetrievalConfig::load()?;
//! let embedder = EmbeddingClient::new(config.embedding.clone())?;
//! let corpus = CorpusIndexStore::initialize(&config.paths.corpus_snapshot())?;
//! let context = corpus
//!     .retrieve(&embedder, "screening for prediabetes", config.search.corpus_top_k)
//!     .await?;
//! ```

mod chunker;
mod config;
mod corpus;
mod embedding;
mod error;
mod extract;
mod indexer;
mod report;
mod snapshot;
mod types;
mod vector_index;

#[cfg(test)]
mod test_support;

pub use chunker::{chunk_text, ChunkStrategy, FixedWindowChunker, ParagraphChunker};
pub use config::{
    ChunkingConfig, EmbeddingConfig, IngestConfig, PathsConfig, RetrievalConfig,
    SearchBehaviorConfig,
};
pub use corpus::{CorpusIndexStore, CorpusIngestor};
#[cfg(feature = "openai")]
pub use embedding::EmbeddingClient;
pub use embedding::{Embedder, FnEmbedder};
pub use error::{RetrievalError, RetrievalResult};
pub use extract::{
    extractor_for_path, AutoExtractor, MarkdownExtractor, PlainTextExtractor, TextExtractor,
};
pub use indexer::{
    embed_chunks, embed_with_retry, embed_with_timeout, EmbedOptions, IndexBuilder,
};
pub use report::{ReportIndex, ReportIndexStore, DEFAULT_REPORT_TOP_K};
pub use snapshot::SnapshotPaths;
pub use types::*;
pub use vector_index::{squared_euclidean, VectorIndex};
