/// ONNX Runtime embedder using the `ort` crate.
///
/// Runs a sentence-transformer model, applies attention-masked mean pooling
/// over the token hidden states, and L2-normalizes the result so that inner
/// product equals cosine similarity.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::tokenizer::SentenceTokenizer;
use super::{Embedder, EmbedderError, l2_normalize};

/// ONNX-backed embedder implementing the `Embedder` trait.
///
/// The session and tokenizer are loaded once at construction and never
/// mutated afterwards; the session mutex only serializes inference calls.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: SentenceTokenizer,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from the given directory.
    ///
    /// `dimensions` is the model's output hidden size (e.g. 384 for
    /// MiniLM-class models).
    pub fn load(model_dir: &Path, dimensions: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");
        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .with_inter_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = SentenceTokenizer::load(model_dir)?;

        info!(
            vocab_size = tokenizer.vocab_size(),
            dimensions, "ONNX model and tokenizer loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let encoded = self.tokenizer.encode(text)?;
        let seq_len = encoded.input_ids.len();

        // (shape, data) tuple tensors avoid ndarray version coupling with ort
        let input_ids = Tensor::from_array(([1usize, seq_len], encoded.input_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask =
            Tensor::from_array(([1usize, seq_len], encoded.attention_mask.clone()))
                .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;
        let token_type_ids = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // Output shape is [1, seq_len, hidden_size], flattened
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let pooled = mean_pooling(
            hidden_data,
            &encoded.attention_mask,
            seq_len,
            self.dimensions,
        );

        l2_normalize(&pooled)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Mean pooling over hidden states weighted by attention mask.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        mask_sum += mask;

        for h in 0..hidden_size {
            pooled[h] += hidden_data[t * hidden_size + h] * mask;
        }
    }

    // Average over real tokens only; padding contributes nothing
    if mask_sum > 0.0 {
        for v in &mut pooled {
            *v /= mask_sum;
        }
    }

    pooled
}
