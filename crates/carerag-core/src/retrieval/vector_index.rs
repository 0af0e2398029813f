//! Exact nearest-neighbor index over a fixed set of chunk embeddings
//!
//! Brute-force squared Euclidean scan. Corpora here are hundreds to low
//! thousands of chunks, where an O(N·D) scan per query is cheap.

use std::cmp::Ordering;

use super::error::{RetrievalError, RetrievalResult};
use super::types::{Embedding, SearchHit};
use crate::EMBEDDING_DIM;

/// Immutable (vector matrix, chunk text) pairing; row i belongs to chunk i
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    /// Row-major N×D matrix
    vectors: Vec<f32>,
    chunks: Vec<String>,
}

impl VectorIndex {
    /// Build an index of [`EMBEDDING_DIM`]-wide vectors
    pub fn build(vectors: Vec<Embedding>, chunks: Vec<String>) -> RetrievalResult<Self> {
        Self::build_with_dimensions(EMBEDDING_DIM, vectors, chunks)
    }

    /// Build an index whose vectors all have `dimensions` components
    pub fn build_with_dimensions(
        dimensions: usize,
        vectors: Vec<Embedding>,
        chunks: Vec<String>,
    ) -> RetrievalResult<Self> {
        if dimensions == 0 {
            return Err(RetrievalError::Configuration(
                "index dimensions must be greater than zero".into(),
            ));
        }
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::DimensionMismatch(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let mut matrix = Vec::with_capacity(vectors.len() * dimensions);
        for (row, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(RetrievalError::DimensionMismatch(format!(
                    "row {} has {} components, expected {}",
                    row,
                    vector.len(),
                    dimensions
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(RetrievalError::InvalidVector(format!(
                    "row {} contains NaN or infinite values",
                    row
                )));
            }
            matrix.extend_from_slice(&vector);
        }

        Ok(Self {
            dimensions,
            vectors: matrix,
            chunks,
        })
    }

    /// Reassemble an index from an already flattened matrix
    pub(crate) fn from_parts(
        dimensions: usize,
        vectors: Vec<f32>,
        chunks: Vec<String>,
    ) -> RetrievalResult<Self> {
        if dimensions == 0 || vectors.len() != chunks.len() * dimensions {
            return Err(RetrievalError::DimensionMismatch(format!(
                "matrix of {} values cannot hold {} rows of width {}",
                vectors.len(),
                chunks.len(),
                dimensions
            )));
        }
        Ok(Self {
            dimensions,
            vectors,
            chunks,
        })
    }

    /// The `k` nearest chunks to `query`, nearest first
    ///
    /// Equal distances keep insertion order. Asking for more hits than
    /// stored rows returns every row.
    pub fn search(&self, query: &[f32], k: usize) -> RetrievalResult<Vec<SearchHit>> {
        if k == 0 {
            return Err(RetrievalError::Configuration(
                "k must be greater than zero".into(),
            ));
        }
        if self.is_empty() {
            return Err(RetrievalError::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch(format!(
                "query has {} components, index expects {}",
                query.len(),
                self.dimensions
            )));
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(RetrievalError::InvalidVector(
                "query contains NaN or infinite values".into(),
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .rows()
            .enumerate()
            .map(|(i, row)| (i, squared_euclidean(query, row)))
            .collect();

        // Stable sort preserves insertion order among ties
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(index, distance)| SearchHit {
                chunk: self.chunks[index].clone(),
                index,
                distance,
            })
            .collect())
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Vector stored for row `i`
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        self.rows().nth(i)
    }

    /// Flattened matrix, row-major
    pub(crate) fn matrix(&self) -> &[f32] {
        &self.vectors
    }

    fn rows(&self) -> std::slice::Chunks<'_, f32> {
        self.vectors.chunks(self.dimensions)
    }
}

/// Squared Euclidean distance; callers guarantee equal lengths
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn small_index() -> VectorIndex {
        VectorIndex::build_with_dimensions(
            2,
            vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            chunks(&["origin", "far", "east", "north"]),
        )
        .unwrap()
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let result = VectorIndex::build_with_dimensions(2, vec![vec![0.0, 0.0]], chunks(&["a", "b"]));
        assert!(matches!(result, Err(RetrievalError::DimensionMismatch(_))));
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let result = VectorIndex::build(vec![vec![0.0; 12]], chunks(&["a"]));
        assert!(matches!(result, Err(RetrievalError::DimensionMismatch(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = VectorIndex::build_with_dimensions(2, vec![vec![f32::NAN, 0.0]], chunks(&["a"]));
        assert!(matches!(result, Err(RetrievalError::InvalidVector(_))));
    }

    #[test]
    fn test_empty_build_then_search_fails() {
        let index = VectorIndex::build(vec![], vec![]).unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.search(&vec![0.0; EMBEDDING_DIM], 3),
            Err(RetrievalError::EmptyIndex)
        ));
    }

    #[test]
    fn test_results_sorted_and_bounded() {
        let index = small_index();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk, "east");
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_k_larger_than_len_returns_all() {
        let hits = small_index().search(&[0.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits.last().unwrap().chunk, "far");
        assert_eq!(hits.last().unwrap().distance, 25.0);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        // east and north are both at distance 1 from the origin
        let hits = small_index().search(&[0.0, 0.0], 3).unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.chunk.as_str()).collect();
        assert_eq!(order, vec!["origin", "east", "north"]);
    }

    #[test]
    fn test_self_retrieval() {
        let index = small_index();
        for i in 0..index.len() {
            let query = index.vector(i).unwrap().to_vec();
            let hits = index.search(&query, 1).unwrap();
            assert_eq!(hits[0].index, i);
            assert_eq!(hits[0].distance, 0.0);
        }
    }

    #[test]
    fn test_invalid_queries() {
        let index = small_index();
        assert!(matches!(
            index.search(&[0.0, 0.0], 0),
            Err(RetrievalError::Configuration(_))
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0, 0.0], 1),
            Err(RetrievalError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_non_finite_query_rejected() {
        let index = VectorIndex::build_with_dimensions(
            2,
            vec![vec![5.0, 5.0], vec![0.0, 0.0]],
            chunks(&["far", "near"]),
        )
        .unwrap();
        for query in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            assert!(matches!(
                index.search(&query, 2),
                Err(RetrievalError::InvalidVector(_))
            ));
        }
    }

    #[test]
    fn test_from_parts_checks_shape() {
        assert!(VectorIndex::from_parts(2, vec![0.0; 3], chunks(&["a", "b"])).is_err());
        let index = VectorIndex::from_parts(2, vec![0.0; 4], chunks(&["a", "b"])).unwrap();
        assert_eq!(index.len(), 2);
    }
}
