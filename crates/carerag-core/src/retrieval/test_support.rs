//! Deterministic embedders for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::embedding::Embedder;
use super::error::{RetrievalError, RetrievalResult};
use super::types::Embedding;
use crate::EMBEDDING_DIM;

/// Words with a dedicated axis; anything else is hashed past them
const VOCABULARY: &[&str] = &[
    "apple", "pie", "recipe", "car", "engine", "repair", "orchard", "guide", "glucose", "insulin",
    "exercise", "diet", "report", "alpha", "beta",
];

/// Bag-of-words embedder: one axis per word, counts as values
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub const DIMENSIONS: usize = EMBEDDING_DIM;

    pub fn vector_for(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0; Self::DIMENSIONS];
        for word in text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
        {
            vector[axis(&word)] += 1.0;
        }
        vector
    }
}

fn axis(word: &str) -> usize {
    if let Some(pos) = VOCABULARY.iter().position(|v| *v == word) {
        return pos;
    }
    let hash = word
        .bytes()
        .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
    VOCABULARY.len() + hash % (KeywordEmbedder::DIMENSIONS - VOCABULARY.len())
}

impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
        Ok(self.vector_for(text))
    }
}

/// Fails the first `n` calls with a retryable error
#[derive(Debug)]
pub struct FlakyEmbedder {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RetrievalError::Embedding(format!("transient failure #{}", call)));
        }
        Ok(KeywordEmbedder.vector_for(text))
    }
}

/// Fails every call whose text contains `poison`
#[derive(Debug)]
pub struct PoisonEmbedder {
    pub poison: &'static str,
}

impl Embedder for PoisonEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
        if text.contains(self.poison) {
            return Err(RetrievalError::Embedding("service unavailable".into()));
        }
        Ok(KeywordEmbedder.vector_for(text))
    }
}

/// Keyword embedder that sleeps for a text-dependent delay first
pub struct SlowEmbedder {
    delay: Box<dyn Fn(&str) -> Duration + Send + Sync>,
}

impl SlowEmbedder {
    pub fn new<F>(delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        Self {
            delay: Box::new(delay),
        }
    }
}

impl Embedder for SlowEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Embedding> {
        tokio::time::sleep((self.delay)(text)).await;
        Ok(KeywordEmbedder.vector_for(text))
    }
}
