/// Text chunking for document ingestion.
///
/// Splits extracted document text into overlapping fixed-length segments.
/// Offsets are counted in characters, not bytes, so multi-byte text never
/// splits inside a code point.
use thiserror::Error;

/// Errors produced by chunking configuration validation.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

/// Split `text` into segments of `chunk_size` characters, each segment after
/// the first starting `chunk_size - overlap` characters after the previous
/// segment's start.
///
/// Empty input yields an empty vector. `overlap >= chunk_size` is rejected:
/// the start offset would never advance.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::InvalidConfig(
            "chunk_size must be positive".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(ChunkError::InvalidConfig(format!(
            "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut segments = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        segments.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(segments)
}
