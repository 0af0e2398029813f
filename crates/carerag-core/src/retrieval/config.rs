//! Retrieval configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::{RetrievalError, RetrievalResult};
use super::snapshot::SnapshotPaths;
use crate::EMBEDDING_DIM;

/// Main retrieval configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Embedding API configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking parameters for both index kinds
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Search behavior configuration
    #[serde(default)]
    pub search: SearchBehaviorConfig,

    /// Embedding pipeline behavior (retries, parallelism)
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Paths configuration
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Embedding API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key (can also use EMBEDDING_API_KEY / AZURE_OPENAI_KEY env vars)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (Azure: the resource endpoint)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model name (Azure: the deployment name)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Azure OpenAI api-version; switches the client to Azure routing when set
    #[serde(default)]
    pub api_version: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            dimensions: default_dimensions(),
            api_version: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Get API key from config or environment
    pub fn get_api_key(&self) -> RetrievalResult<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }

        std::env::var("EMBEDDING_API_KEY")
            .or_else(|_| std::env::var("AZURE_OPENAI_KEY"))
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| RetrievalError::ApiKeyMissing)
    }

    /// Whether requests go through Azure OpenAI deployment routing
    pub fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    EMBEDDING_DIM
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Chunking parameters, in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Fixed window size for the reference corpus
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive windows
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Report paragraphs of this many characters or fewer are dropped
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_paragraph_chars: default_min_paragraph_chars(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    150
}

fn default_min_paragraph_chars() -> usize {
    20
}

/// Search behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBehaviorConfig {
    /// Chunks pulled from the reference corpus per query
    #[serde(default = "default_corpus_top_k")]
    pub corpus_top_k: usize,

    /// Chunks pulled from the current report per question
    #[serde(default = "default_report_top_k")]
    pub report_top_k: usize,
}

impl Default for SearchBehaviorConfig {
    fn default() -> Self {
        Self {
            corpus_top_k: default_corpus_top_k(),
            report_top_k: default_report_top_k(),
        }
    }
}

fn default_corpus_top_k() -> usize {
    5
}

fn default_report_top_k() -> usize {
    3
}

/// Embedding pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Extra attempts per chunk during offline ingestion
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Embedding requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound for a single embedding call
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Report progress every N embedded chunks
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            concurrency: default_concurrency(),
            embed_timeout_secs: default_embed_timeout_secs(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    1
}

fn default_embed_timeout_secs() -> u64 {
    60
}

fn default_progress_every() -> usize {
    20
}

/// Paths configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Corpus vector matrix file
    #[serde(default)]
    pub corpus_vectors_path: Option<PathBuf>,

    /// Corpus chunk text file
    #[serde(default)]
    pub corpus_chunks_path: Option<PathBuf>,
}

impl PathsConfig {
    /// Resolve the corpus snapshot pair, using defaults under the data root
    pub fn corpus_snapshot(&self) -> SnapshotPaths {
        let root = RetrievalConfig::data_root();
        SnapshotPaths {
            vectors: self
                .corpus_vectors_path
                .clone()
                .unwrap_or_else(|| root.join("corpus.vectors")),
            chunks: self
                .corpus_chunks_path
                .clone()
                .unwrap_or_else(|| root.join("corpus.chunks.json")),
        }
    }
}

impl RetrievalConfig {
    /// Load configuration from file and environment
    /// Priority: environment variables > config.toml > defaults
    pub fn load() -> RetrievalResult<Self> {
        let mut config = Self::default();

        let toml_path = Self::config_path();
        if toml_path.exists() {
            let content = std::fs::read_to_string(&toml_path)?;
            config = toml::from_str::<RetrievalConfig>(&content).map_err(|e| {
                RetrievalError::Configuration(format!("{}: {}", toml_path.display(), e))
            })?;
        }

        if let Ok(api_base) =
            std::env::var("EMBEDDING_API_BASE").or_else(|_| std::env::var("AZURE_OPENAI_ENDPOINT"))
        {
            config.embedding.api_base = api_base;
        }
        if let Ok(api_key) =
            std::env::var("EMBEDDING_API_KEY").or_else(|_| std::env::var("AZURE_OPENAI_KEY"))
        {
            config.embedding.api_key = Some(api_key);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(version) = std::env::var("EMBEDDING_API_VERSION") {
            config.embedding.api_version = Some(version);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot run with
    pub fn validate(&self) -> RetrievalResult<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RetrievalError::Configuration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RetrievalError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.search.corpus_top_k == 0 || self.search.report_top_k == 0 {
            return Err(RetrievalError::Configuration(
                "top_k values must be greater than zero".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(RetrievalError::Configuration(
                "embedding dimensions must be greater than zero".into(),
            ));
        }
        if self.ingest.concurrency == 0 {
            return Err(RetrievalError::Configuration(
                "ingest concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Base data directory
    pub fn data_root() -> PathBuf {
        if let Ok(root) = std::env::var("CARERAG_ROOT") {
            return PathBuf::from(root);
        }

        dirs::home_dir()
            .map(|h| h.join(".carerag"))
            .unwrap_or_else(|| PathBuf::from(".carerag"))
    }

    /// Config file path (config.toml)
    pub fn config_path() -> PathBuf {
        Self::data_root().join("config.toml")
    }
}
