//! Retrieval orchestration: the only surface the API layer calls.
//!
//! Ingestion runs Chunker → Embedder → VectorIndex.add; queries run
//! Embedder → VectorIndex.search. The service owns the process-wide index
//! behind a single mutex and writes a full snapshot after every mutation,
//! so a crash right after a successful call never loses committed state.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::info;

use crate::chunker::{self, ChunkError};
use crate::embedder::Embedder;
use crate::index::persist::{PersistError, SnapshotStore};
use crate::index::{ChunkId, IndexError, SearchHit, VectorIndex};

/// Errors surfaced to the API layer.
///
/// None of these is fatal to the process: validation and embedding errors
/// leave the index untouched, and a persistence failure on save leaves the
/// in-memory state correct but unconfirmed on disk.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistError),
}

/// Chunk-retrieval service with process-wide lifetime.
///
/// Construct once at startup with [`RetrievalService::open`], pass by
/// reference to the request-handling layer, and call [`flush`] at
/// shutdown. All operations are synchronous; `add`/`delete`/`search` are
/// serialized by one lock because the underlying store does not support
/// concurrent writers, and a delete rebuild swaps the store out from under
/// any reader.
///
/// [`flush`]: RetrievalService::flush
pub struct RetrievalService {
    index: Mutex<VectorIndex>,
    store: SnapshotStore,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RetrievalService {
    /// Load the snapshot under `index_dir` if one exists, otherwise start
    /// with an empty index.
    ///
    /// A corrupt snapshot is an error: starting empty over unreadable
    /// state would silently drop the whole index.
    pub fn open(
        index_dir: &Path,
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, RetrievalError> {
        let store = SnapshotStore::new(index_dir);
        let index = match store.load(embedder.clone())? {
            Some(index) => {
                info!(entries = index.len(), "restored index from snapshot");
                index
            }
            None => {
                info!("no snapshot found, starting with an empty index");
                VectorIndex::new(embedder)
            }
        };

        Ok(Self {
            index: Mutex::new(index),
            store,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Chunk `text`, embed and index every chunk under `doc_id`, and
    /// return the assigned identities `(doc_id, 0..n)` in chunk order.
    pub fn ingest(&self, doc_id: i64, text: &str) -> Result<Vec<ChunkId>, RetrievalError> {
        let segments = chunker::chunk(text, self.chunk_size, self.chunk_overlap)?;
        if segments.is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "document text produced no chunks".to_string(),
            ));
        }

        let items: Vec<(String, ChunkId)> = segments
            .into_iter()
            .enumerate()
            .map(|(i, segment)| (segment, ChunkId::new(doc_id, i as u32)))
            .collect();
        let ids: Vec<ChunkId> = items.iter().map(|(_, id)| *id).collect();

        let mut index = self.lock();
        index.add(&items)?;
        self.store.save(&index)?;

        info!(doc_id, chunks = ids.len(), "document ingested");
        Ok(ids)
    }

    /// Return up to `k` chunk identities scoring at least `threshold`
    /// against `question`, best first. The caller resolves identities to
    /// chunk content through its own store.
    pub fn query(
        &self,
        question: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let index = self.lock();
        Ok(index.search(question, threshold, k)?)
    }

    /// Remove every listed chunk of `doc_id` from the index.
    ///
    /// `identities` is the caller's enumeration of the document's chunks;
    /// unknown identities are ignored.
    pub fn remove_document(
        &self,
        doc_id: i64,
        identities: &[ChunkId],
    ) -> Result<(), RetrievalError> {
        let doomed: HashSet<ChunkId> = identities.iter().copied().collect();

        let mut index = self.lock();
        let removed = index.delete(&doomed);
        self.store.save(&index)?;

        info!(doc_id, removed, "document removed from index");
        Ok(())
    }

    /// Identities currently indexed for `doc_id`, in insertion order.
    #[must_use]
    pub fn document_chunks(&self, doc_id: i64) -> Vec<ChunkId> {
        self.lock()
            .identities()
            .iter()
            .copied()
            .filter(|id| id.doc_id == doc_id)
            .collect()
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write a final snapshot. Every mutation already snapshots on commit,
    /// so this is the explicit shutdown hook rather than a correctness
    /// requirement.
    pub fn flush(&self) -> Result<(), RetrievalError> {
        let index = self.lock();
        self.store.save(&index)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, VectorIndex> {
        // A panicked holder cannot have left the index misaligned: add
        // commits only after embedding succeeds and delete swaps a fully
        // built store, so the poisoned guard is safe to reclaim.
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use tempfile::tempdir;

    fn open_service(dir: &Path) -> RetrievalService {
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32));
        RetrievalService::open(dir, embedder, 100, 20).unwrap()
    }

    #[test]
    fn test_ingest_assigns_sequential_identities() {
        let dir = tempdir().unwrap();
        let service = open_service(dir.path());

        let text = "A document long enough to be split into several chunks. ".repeat(10);
        let ids = service.ingest(7, &text).unwrap();

        assert!(ids.len() > 1);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, ChunkId::new(7, i as u32));
        }
        assert_eq!(service.len(), ids.len());
    }

    #[test]
    fn test_ingest_empty_text_rejected() {
        let dir = tempdir().unwrap();
        let service = open_service(dir.path());
        assert!(matches!(
            service.ingest(1, ""),
            Err(RetrievalError::InvalidArgument(_))
        ));
        assert!(service.is_empty());
    }

    #[test]
    fn test_query_empty_index_returns_nothing() {
        let dir = tempdir().unwrap();
        let service = open_service(dir.path());
        let hits = service.query("anything at all", 5, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_remove_document_deletes_only_that_document() {
        let dir = tempdir().unwrap();
        let service = open_service(dir.path());

        let text = "Some chunkable document content here. ".repeat(10);
        let doc1 = service.ingest(1, &text).unwrap();
        let doc2 = service.ingest(2, &text).unwrap();

        service.remove_document(1, &doc1).unwrap();

        assert!(service.document_chunks(1).is_empty());
        assert_eq!(service.document_chunks(2), doc2);
    }

    #[test]
    fn test_reingest_after_remove_yields_same_identities() {
        let dir = tempdir().unwrap();
        let service = open_service(dir.path());

        let text = "Identity stability check content. ".repeat(10);
        let first = service.ingest(4, &text).unwrap();
        service.remove_document(4, &first).unwrap();
        let second = service.ingest(4, &text).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let text = "Persistent document content for reload. ".repeat(10);

        let hits_before = {
            let service = open_service(dir.path());
            service.ingest(3, &text).unwrap();
            service.query("reload", 5, -1.0).unwrap()
        };

        let reopened = open_service(dir.path());
        let hits_after = reopened.query("reload", 5, -1.0).unwrap();
        assert_eq!(hits_after, hits_before);
    }
}
