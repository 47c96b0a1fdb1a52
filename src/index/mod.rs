//! Dense vector index over document chunks.
//!
//! Owns chunk identity, embedding generation, and similarity search. The
//! store is a flat row-major `Vec<f32>` paired with an identity list; the
//! identity at position `i` always names the vector row at position `i`,
//! and that alignment holds after every add, delete, save, and load.

pub mod persist;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::embedder::{Embedder, EmbedderError};

/// Composite identity of one chunk: owning document plus its 0-based
/// position within that document.
///
/// Assigned at ingestion time, immutable afterwards, and the only key the
/// index understands. Carries no semantic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub doc_id: i64,
    pub chunk_index: u32,
}

impl ChunkId {
    #[must_use]
    pub fn new(doc_id: i64, chunk_index: u32) -> Self {
        Self { doc_id, chunk_index }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.doc_id, self.chunk_index)
    }
}

/// Errors from index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Embedding(#[from] EmbedderError),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// One search result: a chunk identity and its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
}

/// Flat-storage vector index with exact inner-product search.
///
/// Vectors are unit-normalized by the embedder, so inner product is cosine
/// similarity in `[-1, 1]`. Duplicate identities are permitted; uniqueness
/// is the caller's sequencing concern.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    /// Row-major storage, `len() * dimension` floats.
    vectors: Vec<f32>,
    /// Identity of the vector row at each position.
    identities: Vec<ChunkId>,
}

impl VectorIndex {
    /// Create an empty index whose dimension is fixed by the embedder.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let dimension = embedder.dimensions();
        Self {
            embedder,
            dimension,
            vectors: Vec::new(),
            identities: Vec::new(),
        }
    }

    /// Reconstruct an index from persisted parts. The caller has already
    /// verified that `vectors.len() == identities.len() * dimension`.
    pub(crate) fn from_parts(
        embedder: Arc<dyn Embedder>,
        vectors: Vec<f32>,
        identities: Vec<ChunkId>,
    ) -> Self {
        let dimension = embedder.dimensions();
        debug_assert_eq!(vectors.len(), identities.len() * dimension);
        Self {
            embedder,
            dimension,
            vectors,
            identities,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Identities in insertion order, positionally aligned with the store.
    #[must_use]
    pub fn identities(&self) -> &[ChunkId] {
        &self.identities
    }

    pub(crate) fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }

    /// Embed and append a batch of chunks, preserving input order.
    ///
    /// The whole batch is embedded before anything is stored: if any item
    /// fails to embed, the index is left untouched.
    pub fn add(&mut self, items: &[(String, ChunkId)]) -> Result<(), IndexError> {
        if items.is_empty() {
            return Ok(());
        }

        let texts: Vec<&str> = items.iter().map(|(text, _)| text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    got: embedding.len(),
                });
            }
        }

        // Commit point: nothing below can fail.
        for (embedding, (_, id)) in embeddings.iter().zip(items) {
            self.vectors.extend_from_slice(embedding);
            self.identities.push(*id);
        }

        debug_assert_eq!(self.vectors.len(), self.identities.len() * self.dimension);
        debug!(added = items.len(), total = self.len(), "chunks indexed");
        Ok(())
    }

    /// Return up to `k` chunks scoring at least `threshold` against the
    /// query, best first.
    ///
    /// Equal scores rank by insertion order (earlier-added chunk first),
    /// so results are deterministic. An empty index returns an empty list
    /// without embedding the query.
    pub fn search(
        &self,
        query: &str,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidArgument(
                "k must be positive".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "query text is empty".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query)?;
        if query_vec.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query_vec.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .identities
            .iter()
            .enumerate()
            .map(|(i, &id)| SearchHit {
                id,
                score: dot(self.row(i), &query_vec),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();

        // Stable sort keeps insertion order for equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    /// Remove every chunk whose identity is in `doomed`, returning how many
    /// were removed.
    ///
    /// The flat store has no random deletion, so this rebuilds: retained
    /// rows are copied out of the old store in their original relative
    /// order and the fresh store is swapped in. O(n) in index size per
    /// call; callers batch one call per document.
    pub fn delete(&mut self, doomed: &HashSet<ChunkId>) -> usize {
        if doomed.is_empty() {
            return 0;
        }

        let mut kept_vectors = Vec::new();
        let mut kept_identities = Vec::new();

        for (i, id) in self.identities.iter().enumerate() {
            if !doomed.contains(id) {
                kept_vectors.extend_from_slice(self.row(i));
                kept_identities.push(*id);
            }
        }

        let removed = self.identities.len() - kept_identities.len();
        self.vectors = kept_vectors;
        self.identities = kept_identities;

        debug_assert_eq!(self.vectors.len(), self.identities.len() * self.dimension);
        debug!(removed, total = self.len(), "chunks removed from index");
        removed
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
