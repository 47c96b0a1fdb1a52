/// Embedder trait and shared types for text embedding.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("embedding has zero norm")]
    ZeroNorm,
}

/// Trait for text embedding implementations.
///
/// Every returned vector is unit-length under the L2 norm, so the inner
/// product of two embeddings is their cosine similarity. Implementations
/// must be `Send + Sync` for shared use behind `Arc`; the model is loaded
/// once and holds no per-call mutable state.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a unit-normalized vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple texts; output order matches input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// L2-normalize a raw embedding, returning the normalized copy.
///
/// A zero-norm input is an embedding failure, not a division by zero.
pub(crate) fn l2_normalize(vec: &[f32]) -> Result<Vec<f32>, EmbedderError> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return Err(EmbedderError::ZeroNorm);
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    Ok(vec.iter().map(|v| v * inv_norm).collect())
}
