//! On-disk snapshot of a [`VectorIndex`]
//!
//! Two companion artifacts:
//!
//! - vector file: `CRVX` magic, format version (u32 LE), generation id
//!   (16 bytes), row count (u64 LE), dimensions (u32 LE), then the
//!   row-major matrix as f32 LE.
//! - chunk file: JSON `{ "generation", "dimensions", "chunks": [...] }`.
//!
//! Both carry the same generation id so a pair mixed from two different
//! saves is rejected on restore.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::error::{RetrievalError, RetrievalResult};
use super::vector_index::VectorIndex;

const MAGIC: &[u8; 4] = b"CRVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 16 + 8 + 4;

/// Locations of the two snapshot artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub vectors: PathBuf,
    pub chunks: PathBuf,
}

impl SnapshotPaths {
    /// `<dir>/<stem>.vectors` and `<dir>/<stem>.chunks.json`
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            vectors: dir.join(format!("{}.vectors", stem)),
            chunks: dir.join(format!("{}.chunks.json", stem)),
        }
    }

    pub fn exists(&self) -> bool {
        self.vectors.exists() && self.chunks.exists()
    }
}

#[derive(Serialize)]
struct ChunkFileOut<'a> {
    generation: String,
    dimensions: usize,
    chunks: &'a [String],
}

#[derive(Deserialize)]
struct ChunkFileIn {
    generation: String,
    dimensions: usize,
    chunks: Vec<String>,
}

impl VectorIndex {
    /// Write both artifacts, or neither
    ///
    /// Each artifact is staged in a temp file next to its target, synced,
    /// and then renamed over the target.
    pub fn save(&self, paths: &SnapshotPaths) -> RetrievalResult<()> {
        let generation = Uuid::new_v4();

        let mut vector_bytes = Vec::with_capacity(HEADER_LEN + self.matrix().len() * 4);
        vector_bytes.extend_from_slice(MAGIC);
        vector_bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        vector_bytes.extend_from_slice(generation.as_bytes());
        vector_bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        vector_bytes.extend_from_slice(&(self.dimensions() as u32).to_le_bytes());
        for value in self.matrix() {
            vector_bytes.extend_from_slice(&value.to_le_bytes());
        }

        let chunk_bytes = serde_json::to_vec(&ChunkFileOut {
            generation: generation.to_string(),
            dimensions: self.dimensions(),
            chunks: self.chunks(),
        })?;

        let staged_vectors = stage(&paths.vectors, &vector_bytes)?;
        let staged_chunks = stage(&paths.chunks, &chunk_bytes)?;

        staged_vectors
            .persist(&paths.vectors)
            .map_err(|e| RetrievalError::Io(e.error))?;
        if let Err(e) = staged_chunks.persist(&paths.chunks) {
            // A lone vector file would fail the generation check anyway
            let _ = fs::remove_file(&paths.vectors);
            return Err(RetrievalError::Io(e.error));
        }

        log::info!(
            "[Snapshot] Wrote {} vectors ({}D) to {}",
            self.len(),
            self.dimensions(),
            paths.vectors.display()
        );
        Ok(())
    }

    /// Load an index previously written by [`VectorIndex::save`]
    pub fn restore(paths: &SnapshotPaths) -> RetrievalResult<Self> {
        let bytes = fs::read(&paths.vectors)?;
        let (generation, rows, dimensions, matrix) = parse_vectors(&bytes)?;

        let chunk_file: ChunkFileIn = serde_json::from_slice(&fs::read(&paths.chunks)?)
            .map_err(|e| {
                RetrievalError::CorruptSnapshot(format!("{}: {}", paths.chunks.display(), e))
            })?;

        let chunk_generation = Uuid::parse_str(&chunk_file.generation).map_err(|e| {
            RetrievalError::CorruptSnapshot(format!("bad generation id in chunk file: {}", e))
        })?;
        if chunk_generation != generation {
            return Err(RetrievalError::CorruptSnapshot(format!(
                "vector file generation {} does not match chunk file generation {}",
                generation, chunk_generation
            )));
        }
        if chunk_file.dimensions != dimensions || chunk_file.chunks.len() != rows {
            return Err(RetrievalError::CorruptSnapshot(format!(
                "vector file holds {} rows of {}D, chunk file holds {} chunks of {}D",
                rows,
                dimensions,
                chunk_file.chunks.len(),
                chunk_file.dimensions
            )));
        }

        VectorIndex::from_parts(dimensions, matrix, chunk_file.chunks)
    }
}

fn stage(target: &Path, bytes: &[u8]) -> RetrievalResult<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut file = NamedTempFile::new_in(&dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn parse_vectors(bytes: &[u8]) -> RetrievalResult<(Uuid, usize, usize, Vec<f32>)> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(RetrievalError::CorruptSnapshot(
            "vector file has no valid header".into(),
        ));
    }

    let version = u32::from_le_bytes(read_array(bytes, 4));
    if version != FORMAT_VERSION {
        return Err(RetrievalError::CorruptSnapshot(format!(
            "unsupported vector file version {}",
            version
        )));
    }

    let generation = Uuid::from_bytes(read_array(bytes, 8));
    let rows = u64::from_le_bytes(read_array(bytes, 24)) as usize;
    let dimensions = u32::from_le_bytes(read_array(bytes, 32)) as usize;

    let body = &bytes[HEADER_LEN..];
    let expected = rows
        .checked_mul(dimensions)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RetrievalError::CorruptSnapshot("matrix size overflows".into()))?;
    if body.len() != expected {
        return Err(RetrievalError::CorruptSnapshot(format!(
            "expected {} matrix bytes for {}x{}, found {}",
            expected,
            rows,
            dimensions,
            body.len()
        )));
    }

    let matrix = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((generation, rows, dimensions, matrix))
}

/// Copy `N` bytes starting at `offset`; the header length is checked first
fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
