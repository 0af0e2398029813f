//! Retrieval core for CareRAG
//!
//! Turns reference documents and generated reports into searchable vector
//! indexes and returns the most relevant passages as grounding context.

pub mod retrieval;

/// Width of every embedding vector, matching `text-embedding-3-small`
pub const EMBEDDING_DIM: usize = 1536;

pub use retrieval::{
    CorpusIndexStore, CorpusIngestor, Embedder, RetrievalConfig, RetrievalError,
    RetrievalResult, ReportIndexStore, VectorIndex,
};
