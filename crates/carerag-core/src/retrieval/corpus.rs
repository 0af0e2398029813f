//! Long-lived reference corpus index
//!
//! Built offline by [`CorpusIngestor`], restored once at startup by
//! [`CorpusIndexStore::initialize`], and read-only afterwards.

use std::path::Path;
use std::time::{Duration, Instant};

use super::chunker::FixedWindowChunker;
use super::config::RetrievalConfig;
use super::embedding::Embedder;
use super::error::RetrievalResult;
use super::extract::TextExtractor;
use super::indexer::{embed_with_timeout, EmbedOptions, IndexBuilder};
use super::snapshot::SnapshotPaths;
use super::types::{join_context, IndexProgress, IndexStats, SearchHit};
use super::vector_index::VectorIndex;

/// Read-only store over the reference corpus
#[derive(Debug)]
pub struct CorpusIndexStore {
    index: VectorIndex,
    /// Upper bound for embedding one query
    query_timeout: Duration,
}

impl CorpusIndexStore {
    /// Restore the persisted corpus snapshot
    ///
    /// Missing or malformed artifacts are returned as errors; a server
    /// cannot answer grounded requests without them.
    pub fn initialize(paths: &SnapshotPaths) -> RetrievalResult<Self> {
        let index = VectorIndex::restore(paths)?;
        log::info!(
            "[Corpus] Loaded {} chunks ({}D) from {}",
            index.len(),
            index.dimensions(),
            paths.vectors.display()
        );
        Ok(Self::from_index(index))
    }

    /// Wrap an index that is already in memory
    pub fn from_index(index: VectorIndex) -> Self {
        Self {
            index,
            query_timeout: EmbedOptions::default().timeout,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Ranked hits for `query`
    pub async fn search<E: Embedder>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> RetrievalResult<Vec<SearchHit>> {
        let vector = embed_with_timeout(embedder, query, self.query_timeout).await?;
        self.index.search(&vector, k)
    }

    /// Newline-joined context for `query`, most relevant first
    pub async fn retrieve<E: Embedder>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> RetrievalResult<String> {
        let hits = self.search(embedder, query, k).await?;
        Ok(join_context(&hits))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Offline job turning a reference document into a corpus snapshot
pub struct CorpusIngestor<'a, X: TextExtractor + ?Sized> {
    extractor: &'a X,
    chunker: FixedWindowChunker,
    builder: IndexBuilder,
    output: SnapshotPaths,
}

impl<'a, X: TextExtractor + ?Sized> CorpusIngestor<'a, X> {
    pub fn new(
        extractor: &'a X,
        chunker: FixedWindowChunker,
        builder: IndexBuilder,
        output: SnapshotPaths,
    ) -> Self {
        Self {
            extractor,
            chunker,
            builder,
            output,
        }
    }

    /// Ingestor configured from `config` (chunk sizes, retries, paths)
    pub fn from_config(extractor: &'a X, config: &RetrievalConfig) -> RetrievalResult<Self> {
        let chunker =
            FixedWindowChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let builder = IndexBuilder::new(
            config.embedding.dimensions,
            EmbedOptions::from(&config.ingest),
        );
        Ok(Self::new(
            extractor,
            chunker,
            builder,
            config.paths.corpus_snapshot(),
        ))
    }

    pub fn output(&self) -> &SnapshotPaths {
        &self.output
    }

    /// Ingest `source`, writing the snapshot only if every chunk embedded
    pub async fn ingest<E: Embedder>(
        &self,
        source: &Path,
        embedder: &E,
    ) -> RetrievalResult<IndexStats> {
        self.ingest_with_progress(source, embedder, |_| {}).await
    }

    pub async fn ingest_with_progress<E, F>(
        &self,
        source: &Path,
        embedder: &E,
        mut on_progress: F,
    ) -> RetrievalResult<IndexStats>
    where
        E: Embedder,
        F: FnMut(IndexProgress),
    {
        let start = Instant::now();
        log::info!("[Corpus] Ingesting {}", source.display());

        let text = self.extractor.extract(source)?;
        let index = self
            .builder
            .build_with_progress(&text, &self.chunker, embedder, &mut on_progress)
            .await?;

        on_progress(IndexProgress::new(
            "storing",
            index.len(),
            index.len(),
            Some(format!("Writing {}", self.output.vectors.display())),
        ));
        index.save(&self.output)?;

        let stats = IndexStats {
            source: source.display().to_string(),
            total_chunks: index.len(),
            dimensions: index.dimensions(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            built_at: chrono::Utc::now().to_rfc3339(),
            published: true,
        };

        on_progress(IndexProgress::new(
            "done",
            stats.total_chunks,
            stats.total_chunks,
            Some(format!("Ingestion complete: {} chunks", stats.total_chunks)),
        ));
        log::info!(
            "[Corpus] Ingested {} chunks in {}ms",
            stats.total_chunks,
            stats.elapsed_ms
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::error::RetrievalError;
    use crate::retrieval::extract::PlainTextExtractor;
    use crate::retrieval::test_support::{
        FlakyEmbedder, KeywordEmbedder, PoisonEmbedder, SlowEmbedder,
    };
    use tempfile::TempDir;

    fn ingestor<'a>(
        extractor: &'a PlainTextExtractor,
        output: SnapshotPaths,
    ) -> CorpusIngestor<'a, PlainTextExtractor> {
        let options = EmbedOptions {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            concurrency: 1,
            timeout: Duration::from_secs(5),
            progress_every: 2,
        };
        CorpusIngestor::new(
            extractor,
            FixedWindowChunker::new(20, 5).unwrap(),
            IndexBuilder::new(KeywordEmbedder::DIMENSIONS, options),
            output,
        )
    }

    fn write_source(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("guidelines.txt");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ingest_then_initialize_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let source = write_source(
            &dir,
            "insulin dosing basics and timing. regular exercise lowers glucose. diet matters too.",
        );
        let output = SnapshotPaths::in_dir(dir.path(), "corpus");
        let extractor = PlainTextExtractor;

        let mut phases = Vec::new();
        let stats = ingestor(&extractor, output.clone())
            .ingest_with_progress(&source, &KeywordEmbedder, |p| phases.push(p.phase))
            .await
            .unwrap();

        assert!(stats.total_chunks > 1);
        assert_eq!(phases.first().map(String::as_str), Some("chunking"));
        assert_eq!(phases.last().map(String::as_str), Some("done"));

        let store = CorpusIndexStore::initialize(&output).unwrap();
        assert_eq!(store.index().len(), stats.total_chunks);

        // Repeating the word outweighs the unrelated words sharing a window
        let context = store
            .retrieve(&KeywordEmbedder, "exercise exercise exercise", 1)
            .await
            .unwrap();
        assert!(context.contains("exercise"));
    }

    #[tokio::test]
    async fn test_retryable_failures_do_not_abort() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "apple orchard guide for beginners");
        let output = SnapshotPaths::in_dir(dir.path(), "corpus");
        let extractor = PlainTextExtractor;

        let embedder = FlakyEmbedder::failing_first(2);
        ingestor(&extractor, output.clone())
            .ingest(&source, &embedder)
            .await
            .unwrap();
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_persistent_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "apple orchard guide. car engine repair manual.");
        let output = SnapshotPaths::in_dir(dir.path(), "corpus");
        let extractor = PlainTextExtractor;

        let result = ingestor(&extractor, output.clone())
            .ingest(&source, &PoisonEmbedder { poison: "engine" })
            .await;

        assert!(matches!(result, Err(RetrievalError::Embedding(_))));
        assert!(!output.vectors.exists());
        assert!(!output.chunks.exists());
    }

    #[test]
    fn test_initialize_without_artifacts_fails() {
        let dir = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(dir.path(), "absent");
        assert!(CorpusIndexStore::initialize(&paths).is_err());
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_corpus_is_an_error() {
        let store = CorpusIndexStore::from_index(VectorIndex::build(vec![], vec![]).unwrap());
        assert!(matches!(
            store.retrieve(&KeywordEmbedder, "apple", 3).await,
            Err(RetrievalError::EmptyIndex)
        ));
    }

    #[tokio::test]
    async fn test_stalled_query_embedding_times_out() {
        let embedder = KeywordEmbedder;
        let chunks = vec!["apple pie recipe".to_string()];
        let vectors = chunks.iter().map(|c| embedder.vector_for(c)).collect();
        let store = CorpusIndexStore::from_index(VectorIndex::build(vectors, chunks).unwrap())
            .with_query_timeout(Duration::from_millis(20));

        let stalled = SlowEmbedder::new(|_| Duration::from_secs(30));
        assert!(matches!(
            store.retrieve(&stalled, "apple", 1).await,
            Err(RetrievalError::Embedding(_))
        ));
    }
}
