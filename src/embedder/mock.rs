/// Mock embedder for testing without a real model.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError, l2_normalize};

/// Deterministic embedder seeded by a hash of the input text.
///
/// Distinct texts map to distinct directions with overwhelming probability,
/// and the same text always maps to the same vector, which is enough for
/// index and persistence tests.
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;

        // Linear congruential walk from the text hash; centered so vectors
        // point in varied directions rather than clustering in one orthant.
        let mut raw = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            raw.push(unit - 0.5);
        }

        l2_normalize(&raw)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
