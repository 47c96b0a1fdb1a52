/// Wrapper around the HuggingFace `tokenizers` crate for sentence models.
use std::path::Path;

use tokenizers::Tokenizer;

use super::EmbedderError;

/// Tokenizer configured for BERT-style sentence embedding models.
pub struct SentenceTokenizer {
    inner: Tokenizer,
}

/// Token IDs and attention mask for one encoded text.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

/// Maximum sequence length fed to the model; longer inputs are truncated.
const MAX_SEQ_LEN: usize = 512;

impl SentenceTokenizer {
    /// Load `tokenizer.json` from the model directory.
    pub fn load(model_dir: &Path) -> Result<Self, EmbedderError> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(EmbedderError::TokenizerError(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to load tokenizer: {e}")))?;

        let _ = inner.with_truncation(Some(tokenizers::TruncationParams {
            max_length: MAX_SEQ_LEN,
            ..Default::default()
        }));
        inner.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        Ok(Self { inner })
    }

    /// Encode a single text, returning token IDs and attention mask.
    pub fn encode(&self, text: &str) -> Result<Encoded, EmbedderError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode text: {e}")))?;

        Ok(Encoded {
            input_ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect(),
        })
    }

    /// Vocabulary size of the loaded tokenizer.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }
}
