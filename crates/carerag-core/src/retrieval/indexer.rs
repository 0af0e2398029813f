//! Chunk → embed → build pipeline shared by both index kinds

use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use super::chunker::ChunkStrategy;
use super::config::IngestConfig;
use super::embedding::Embedder;
use super::error::{RetrievalError, RetrievalResult};
use super::types::{Embedding, IndexProgress, TextChunk};
use super::vector_index::VectorIndex;

/// How chunk embeddings are requested
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Extra attempts after a retryable failure
    pub max_retries: u32,
    /// Delay before retry n is `retry_backoff * n`
    pub retry_backoff: Duration,
    /// Requests in flight at once
    pub concurrency: usize,
    /// Upper bound for one embedding call
    pub timeout: Duration,
    /// Emit an "embedding" progress event every N chunks
    pub progress_every: usize,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for EmbedOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.embed_timeout_secs),
            progress_every: config.progress_every.max(1),
        }
    }
}

impl EmbedOptions {
    /// Same settings without retries, for request-path rebuilds
    pub fn without_retries(mut self) -> Self {
        self.max_retries = 0;
        self
    }
}

/// Builds a [`VectorIndex`] from raw text with a given chunking strategy
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    dimensions: usize,
    options: EmbedOptions,
}

impl IndexBuilder {
    pub fn new(dimensions: usize, options: EmbedOptions) -> Self {
        Self {
            dimensions,
            options,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    /// Chunk, embed and index `text`
    pub async fn build<S, E>(
        &self,
        text: &str,
        strategy: &S,
        embedder: &E,
    ) -> RetrievalResult<VectorIndex>
    where
        S: ChunkStrategy + ?Sized,
        E: Embedder,
    {
        self.build_with_progress(text, strategy, embedder, |_| {})
            .await
    }

    /// Chunk, embed and index `text`, reporting progress
    pub async fn build_with_progress<S, E, F>(
        &self,
        text: &str,
        strategy: &S,
        embedder: &E,
        mut on_progress: F,
    ) -> RetrievalResult<VectorIndex>
    where
        S: ChunkStrategy + ?Sized,
        E: Embedder,
        F: FnMut(IndexProgress),
    {
        let chunks = strategy.chunk(text);
        on_progress(IndexProgress::new(
            "chunking",
            chunks.len(),
            chunks.len(),
            Some(format!("{} chunks ({})", chunks.len(), strategy.name())),
        ));
        log::debug!(
            "[Indexer] {} produced {} chunks from {} chars",
            strategy.name(),
            chunks.len(),
            text.chars().count()
        );

        let vectors = embed_chunks(embedder, &chunks, &self.options, &mut on_progress).await?;
        let texts = chunks.into_iter().map(|c| c.content).collect();

        VectorIndex::build_with_dimensions(self.dimensions, vectors, texts)
    }
}

/// Embed every chunk, keeping results aligned with `chunks` by index
///
/// At most `concurrency` requests are in flight. Responses arrive in
/// completion order; each carries its chunk index and is slotted back
/// into place.
pub async fn embed_chunks<E, F>(
    embedder: &E,
    chunks: &[TextChunk],
    options: &EmbedOptions,
    mut on_progress: F,
) -> RetrievalResult<Vec<Embedding>>
where
    E: Embedder,
    F: FnMut(IndexProgress),
{
    let total = chunks.len();
    let limit = options.concurrency.max(1);
    let mut slots: Vec<Option<Embedding>> = vec![None; total];
    let mut in_flight = FuturesUnordered::new();
    let mut next = 0;

    while next < total && in_flight.len() < limit {
        in_flight.push(embed_indexed(embedder, next, &chunks[next].content, options));
        next += 1;
    }

    let mut embedded = 0;
    while let Some((i, result)) = in_flight.next().await {
        let vector = result.map_err(|e| match e {
            RetrievalError::Embedding(msg) => {
                RetrievalError::Embedding(format!("chunk {}: {}", i, msg))
            }
            other => other,
        })?;
        slots[i] = Some(vector);
        embedded += 1;

        if next < total {
            in_flight.push(embed_indexed(embedder, next, &chunks[next].content, options));
            next += 1;
        }

        if embedded % options.progress_every.max(1) == 0 || embedded == total {
            on_progress(IndexProgress::new(
                "embedding",
                embedded,
                total,
                Some(format!("Embedded {}/{}", embedded, total)),
            ));
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| RetrievalError::Embedding(format!("chunk {} was not embedded", i)))
        })
        .collect()
}

async fn embed_indexed<E: Embedder>(
    embedder: &E,
    index: usize,
    text: &str,
    options: &EmbedOptions,
) -> (usize, RetrievalResult<Embedding>) {
    (index, embed_with_retry(embedder, text, options).await)
}

/// One embedding call; a stall past `timeout` becomes an `Embedding` error
pub async fn embed_with_timeout<E: Embedder>(
    embedder: &E,
    text: &str,
    timeout: Duration,
) -> RetrievalResult<Embedding> {
    match tokio::time::timeout(timeout, embedder.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(RetrievalError::Embedding(format!(
            "timed out after {}s",
            timeout.as_secs_f32()
        ))),
    }
}

/// One embedding call with timeout and bounded retries
pub async fn embed_with_retry<E: Embedder>(
    embedder: &E,
    text: &str,
    options: &EmbedOptions,
) -> RetrievalResult<Embedding> {
    let mut attempt = 0;
    loop {
        match embed_with_timeout(embedder, text, options.timeout).await {
            Ok(vector) => return Ok(vector),
            Err(e) if e.is_retryable() && attempt < options.max_retries => {
                attempt += 1;
                log::warn!(
                    "[Indexer] Embedding attempt {} failed, retrying: {}",
                    attempt,
                    e
                );
                tokio::time::sleep(options.retry_backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}
