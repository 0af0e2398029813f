//! Common types for the retrieval module

use serde::Serialize;

/// Embedding vector
pub type Embedding = Vec<f32>;

/// A chunk of source text before it is embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The text content
    pub content: String,
    /// Position of this chunk within its source document
    pub index: usize,
}

/// A single nearest-neighbor match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Matched chunk text
    pub chunk: String,
    /// Row of the chunk inside the index
    pub index: usize,
    /// Squared Euclidean distance to the query (0 = identical)
    pub distance: f32,
}

/// Join ranked hits into the context string handed to prompt construction
pub fn join_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.chunk.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index build statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Where the indexed text came from
    pub source: String,
    /// Total chunks indexed
    pub total_chunks: usize,
    /// Vector width
    pub dimensions: usize,
    /// Time elapsed in milliseconds
    pub elapsed_ms: u64,
    /// Build completion time (RFC 3339)
    pub built_at: String,
    /// Whether the built index became the one queries are served from
    pub published: bool,
}

/// Index build progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProgress {
    /// Current phase: "chunking", "embedding", "storing", "done"
    pub phase: String,
    /// Current item being processed
    pub current: usize,
    /// Total items to process
    pub total: usize,
    /// Percentage complete (0-100)
    pub percent: u8,
    /// Optional message
    pub message: Option<String>,
}

impl IndexProgress {
    pub(crate) fn new(phase: &str, current: usize, total: usize, message: Option<String>) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((current.min(total) * 100) / total) as u8
        };
        Self {
            phase: phase.to_string(),
            current,
            total,
            percent,
            message,
        }
    }
}
