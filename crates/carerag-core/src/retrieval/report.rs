//! Per-report index, replaced every time a new report is generated
//!
//! The store holds at most one [`ReportIndex`] behind an `Arc`. A rebuild
//! constructs the new index completely before publishing it with a single
//! pointer swap, so a reader sees either the old index or the new one and
//! never a mixture. Readers that grabbed the old `Arc` before a swap finish
//! their search against it.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::chunker::ParagraphChunker;
use super::config::RetrievalConfig;
use super::embedding::Embedder;
use super::error::{RetrievalError, RetrievalResult};
use super::extract::{AutoExtractor, TextExtractor};
use super::indexer::{embed_with_timeout, EmbedOptions, IndexBuilder};
use super::types::{join_context, IndexStats, SearchHit};
use super::vector_index::VectorIndex;

/// Default number of report chunks returned per question
pub const DEFAULT_REPORT_TOP_K: usize = 3;

/// A published report index and where it came from
#[derive(Debug)]
pub struct ReportIndex {
    pub id: Uuid,
    pub source: String,
    pub built_at: DateTime<Utc>,
    pub index: VectorIndex,
}

/// Published index plus the rebuild ticket that produced it
struct Published {
    ticket: u64,
    report: Arc<ReportIndex>,
}

/// Holder of the current report index
pub struct ReportIndexStore {
    current: RwLock<Option<Published>>,
    next_ticket: AtomicU64,
    chunker: ParagraphChunker,
    extractor: Box<dyn TextExtractor>,
    builder: IndexBuilder,
}

impl ReportIndexStore {
    pub fn new(
        chunker: ParagraphChunker,
        extractor: Box<dyn TextExtractor>,
        builder: IndexBuilder,
    ) -> Self {
        Self {
            current: RwLock::new(None),
            next_ticket: AtomicU64::new(0),
            chunker,
            extractor,
            builder,
        }
    }

    /// Store configured from `config`; extraction picks by file extension
    ///
    /// Rebuilds happen on the request path, so embedding failures are not
    /// retried here.
    pub fn from_config(config: &RetrievalConfig) -> RetrievalResult<Self> {
        let chunker = ParagraphChunker::new(config.chunking.min_paragraph_chars)?;
        let builder = IndexBuilder::new(
            config.embedding.dimensions,
            EmbedOptions::from(&config.ingest).without_retries(),
        );
        Ok(Self::new(chunker, Box::new(AutoExtractor), builder))
    }

    /// Index the document at `path` and make it the current report
    pub async fn rebuild<E: Embedder>(
        &self,
        path: &Path,
        embedder: &E,
    ) -> RetrievalResult<IndexStats> {
        let text = self.extractor.extract(path)?;
        self.rebuild_from_text(&path.display().to_string(), &text, embedder)
            .await
    }

    /// Index already extracted report text and make it current
    ///
    /// On any failure the previously published index stays in place. When a
    /// rebuild started later has already published, this build is dropped
    /// and the returned stats carry `published: false`.
    pub async fn rebuild_from_text<E: Embedder>(
        &self,
        source: &str,
        text: &str,
        embedder: &E,
    ) -> RetrievalResult<IndexStats> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();

        let index = self.builder.build(text, &self.chunker, embedder).await?;
        if index.is_empty() {
            return Err(RetrievalError::Extraction(format!(
                "{} has no paragraphs longer than {} characters",
                source,
                self.chunker.min_chars()
            )));
        }

        let report = Arc::new(ReportIndex {
            id: Uuid::new_v4(),
            source: source.to_string(),
            built_at: Utc::now(),
            index,
        });
        let mut stats = IndexStats {
            source: report.source.clone(),
            total_chunks: report.index.len(),
            dimensions: report.index.dimensions(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            built_at: report.built_at.to_rfc3339(),
            published: false,
        };

        let mut current = self.current.write();
        match current.as_ref() {
            Some(published) if published.ticket > ticket => {
                log::info!(
                    "[ReportIndex] Discarding build of {}: a newer report is already current",
                    source
                );
            }
            _ => {
                log::info!(
                    "[ReportIndex] Published {} ({} chunks) from {}",
                    report.id,
                    stats.total_chunks,
                    source
                );
                *current = Some(Published { ticket, report });
                stats.published = true;
            }
        }

        Ok(stats)
    }

    /// Newline-joined report context for `question`
    pub async fn query<E: Embedder>(
        &self,
        question: &str,
        embedder: &E,
        k: usize,
    ) -> RetrievalResult<String> {
        let hits = self.search(question, embedder, k).await?;
        Ok(join_context(&hits))
    }

    /// Ranked hits for `question` against the current report
    pub async fn search<E: Embedder>(
        &self,
        question: &str,
        embedder: &E,
        k: usize,
    ) -> RetrievalResult<Vec<SearchHit>> {
        // Pin one index for the whole query; a concurrent swap cannot affect it
        let report = self.current().ok_or(RetrievalError::NotReady)?;
        let timeout = self.builder.options().timeout;
        let vector = embed_with_timeout(embedder, question, timeout).await?;
        report.index.search(&vector, k)
    }

    /// The published report index, if any
    pub fn current(&self) -> Option<Arc<ReportIndex>> {
        self.current
            .read()
            .as_ref()
            .map(|published| Arc::clone(&published.report))
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}
