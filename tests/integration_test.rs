/// End-to-end integration tests for the retrieval pipeline.
///
/// Tests the complete flow:
///   Config → Service → Chunker → Embedder → Index → Snapshot → Search → Delete
use std::path::Path;
use std::sync::Arc;

use docqa::config::Config;
use docqa::embedder::mock::MockEmbedder;
use docqa::embedder::{Embedder, EmbedderError};
use docqa::index::ChunkId;
use docqa::service::RetrievalService;
use tempfile::tempdir;

/// Two-dimensional embedder with fixed directions per known text, for
/// asserting exact scores and orderings.
struct PlanarEmbedder;

impl PlanarEmbedder {
    fn raw(text: &str) -> Result<[f32; 2], EmbedderError> {
        match text {
            "east" => Ok([1.0, 0.0]),
            "north" => Ok([0.0, 1.0]),
            "northeast" => Ok([0.7, 0.7]),
            other => Err(EmbedderError::InferenceFailed(format!(
                "unknown planar text: {other}"
            ))),
        }
    }
}

impl Embedder for PlanarEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let raw = Self::raw(text)?;
        let norm = (raw[0] * raw[0] + raw[1] * raw[1]).sqrt();
        Ok(vec![raw[0] / norm, raw[1] / norm])
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn planar_service(dir: &Path) -> RetrievalService {
    RetrievalService::open(dir, Arc::new(PlanarEmbedder), 20, 0).unwrap()
}

fn mock_service(dir: &Path) -> RetrievalService {
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(384));
    RetrievalService::open(dir, embedder, 80, 20).unwrap()
}

/// Full pipeline: ingest → query → reopen → delete, with the mock embedder.
#[test]
fn test_full_pipeline() {
    let temp_dir = tempdir().unwrap();
    let index_dir = temp_dir.path().join("index");

    let service = mock_service(&index_dir);

    // 1. Ingest two documents
    let rust_doc = "Rust is a systems programming language focused on safety and performance. \
        It guarantees memory safety without a garbage collector. "
        .repeat(3);
    let cook_doc = "Bring a large pot of salted water to a rolling boil before adding the pasta. \
        Reserve a cup of the starchy cooking water for the sauce. "
        .repeat(3);

    let rust_ids = service.ingest(1, &rust_doc).unwrap();
    let cook_ids = service.ingest(2, &cook_doc).unwrap();

    assert!(rust_ids.len() > 1, "long text should produce several chunks");
    for (i, id) in rust_ids.iter().enumerate() {
        assert_eq!(*id, ChunkId::new(1, i as u32));
    }
    assert_eq!(service.len(), rust_ids.len() + cook_ids.len());

    // 2. Query returns well-formed, rank-ordered hits
    let hits = service.query("memory safety", 5, -1.0).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 5);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score, "hits must be sorted by score");
    }
    for hit in &hits {
        assert!((-1.0..=1.0).contains(&hit.score), "score outside [-1, 1]");
    }

    // 3. Snapshot round trip: a reopened service answers identically
    let reopened = mock_service(&index_dir);
    assert_eq!(reopened.len(), service.len());
    let hits_after = reopened.query("memory safety", 5, -1.0).unwrap();
    assert_eq!(hits_after, hits);

    // 4. Remove one document; the other survives, on disk too
    reopened.remove_document(1, &rust_ids).unwrap();
    assert!(reopened.document_chunks(1).is_empty());
    assert_eq!(reopened.document_chunks(2), cook_ids);

    let reopened_again = mock_service(&index_dir);
    assert!(reopened_again.document_chunks(1).is_empty());
    assert_eq!(reopened_again.document_chunks(2), cook_ids);
}

/// Fixed-vector scenario: with stored directions [1,0], [0,1], [0.7,0.7]
/// and query [0.7,0.7] at threshold 0.9, only the diagonal chunk clears
/// the bar, scoring 1.0; the axis chunks score ≈0.707.
#[test]
fn test_threshold_scenario_exact_membership() {
    let temp_dir = tempdir().unwrap();
    let service = planar_service(temp_dir.path());

    service.ingest(1, "east").unwrap();
    service.ingest(2, "north").unwrap();
    service.ingest(3, "northeast").unwrap();

    let hits = service.query("northeast", 5, 0.9).unwrap();
    assert_eq!(hits.len(), 1, "only the diagonal chunk clears 0.9");
    assert_eq!(hits[0].id, ChunkId::new(3, 0));
    assert!((hits[0].score - 1.0).abs() < 1e-5);

    // Below the threshold the axis chunks appear with cosine ≈ 0.707
    let all = service.query("northeast", 5, -1.0).unwrap();
    assert_eq!(all.len(), 3);
    for hit in &all[1..] {
        assert!((hit.score - 0.707).abs() < 0.01, "got {}", hit.score);
    }
}

/// Delete scenario: removing one chunk leaves the others retrievable in
/// original relative order with bit-identical vectors.
#[test]
fn test_delete_preserves_remaining_vectors() {
    let temp_dir = tempdir().unwrap();
    let service = planar_service(temp_dir.path());

    service.ingest(1, "east").unwrap();
    service.ingest(2, "north").unwrap();
    service.ingest(3, "northeast").unwrap();

    let before = service.query("northeast", 5, -1.0).unwrap();

    service.remove_document(1, &[ChunkId::new(1, 0)]).unwrap();

    let after = service.query("northeast", 5, -1.0).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id, ChunkId::new(3, 0));
    assert_eq!(after[1].id, ChunkId::new(2, 0));

    // Scores are bit-identical to the pre-delete run for surviving chunks
    let before_diag = before.iter().find(|h| h.id == ChunkId::new(3, 0)).unwrap();
    let before_north = before.iter().find(|h| h.id == ChunkId::new(2, 0)).unwrap();
    assert_eq!(after[0].score, before_diag.score);
    assert_eq!(after[1].score, before_north.score);

    // The deleted chunk no longer matches its own direction
    let east_hits = service.query("east", 5, 0.99).unwrap();
    assert!(east_hits.is_empty());
}

/// Boundary: a freshly constructed, never-loaded index answers queries
/// with an empty list and no error; k=1 caps results at one.
#[test]
fn test_boundaries() {
    let temp_dir = tempdir().unwrap();
    let service = planar_service(temp_dir.path());

    let empty = service.query("northeast", 5, -1.0).unwrap();
    assert!(empty.is_empty());

    service.ingest(1, "east").unwrap();
    service.ingest(2, "north").unwrap();

    let capped = service.query("east", 1, -1.0).unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].id, ChunkId::new(1, 0));

    // k=1 with an impossible threshold yields zero, never more
    let none = service.query("east", 1, 1.5).unwrap();
    assert!(none.is_empty());
}

/// Re-ingesting a document after deletion yields the same identity set as
/// a fresh ingest.
#[test]
fn test_identity_idempotence_across_delete() {
    let temp_dir = tempdir().unwrap();
    let service = mock_service(temp_dir.path());

    let text = "A reasonably long document used to check identity stability. ".repeat(5);
    let first = service.ingest(9, &text).unwrap();
    service.remove_document(9, &first).unwrap();
    let second = service.ingest(9, &text).unwrap();

    assert_eq!(first, second);
}

/// Config defaults and validation for the shipped template.
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();

    assert_eq!(config.chunk_size, 1000);
    assert_eq!(config.chunk_overlap, 200);
    assert_eq!(config.search_top_k, 5);
    assert_eq!(config.model.dimensions, 384);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.chunk_overlap = bad_config.chunk_size;
    assert!(bad_config.validate().is_err());
}
