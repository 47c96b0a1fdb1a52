//! Snapshot persistence for the vector index.
//!
//! A snapshot is two artifacts: the raw little-endian f32 vector store
//! (`vectors.bin`) and a JSON manifest holding the dimension and the
//! ordered identity list (`manifest.json`). Both are written to temporary
//! files and renamed into place, so a crash mid-save never leaves a torn
//! pair. A missing snapshot is an expected state; a half-present or
//! undecodable one is corruption and propagates as an error.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::{ChunkId, VectorIndex};
use crate::embedder::Embedder;

const VECTORS_FILE: &str = "vectors.bin";
const MANIFEST_FILE: &str = "manifest.json";

/// Errors from snapshot save/load.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("manifest encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Identity list and dimension paired with the vector file.
#[derive(Serialize, Deserialize)]
struct Manifest {
    dimension: usize,
    identities: Vec<ChunkId>,
}

/// Reads and writes index snapshots under one directory.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Write a full snapshot of `index`, replacing any prior one.
    pub fn save(&self, index: &VectorIndex) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;

        let vectors_tmp = self.dir.join(format!("{VECTORS_FILE}.tmp"));
        let manifest_tmp = self.dir.join(format!("{MANIFEST_FILE}.tmp"));

        fs::write(&vectors_tmp, bytemuck::cast_slice::<f32, u8>(index.vectors()))?;

        let manifest = Manifest {
            dimension: index.dimension(),
            identities: index.identities().to_vec(),
        };
        fs::write(&manifest_tmp, serde_json::to_vec(&manifest)?)?;

        // Rename only after both temps are fully written
        fs::rename(&vectors_tmp, self.vectors_path())?;
        fs::rename(&manifest_tmp, self.manifest_path())?;

        info!(
            entries = index.len(),
            dir = %self.dir.display(),
            "index snapshot saved"
        );
        Ok(())
    }

    /// Load the persisted index, or `None` if no snapshot exists.
    ///
    /// "No snapshot" means neither artifact is present. Anything else that
    /// prevents reconstruction — one file of the pair missing, a length
    /// that doesn't tile into rows, a manifest that doesn't parse, or a
    /// dimension that disagrees with the embedder — is `Corrupt` and must
    /// be surfaced, never papered over with an empty index.
    pub fn load(&self, embedder: Arc<dyn Embedder>) -> Result<Option<VectorIndex>, PersistError> {
        let vectors_path = self.vectors_path();
        let manifest_path = self.manifest_path();

        match (vectors_path.exists(), manifest_path.exists()) {
            (false, false) => return Ok(None),
            (true, true) => {}
            (vectors, _) => {
                let missing = if vectors { MANIFEST_FILE } else { VECTORS_FILE };
                return Err(PersistError::Corrupt(format!(
                    "torn snapshot in {}: {missing} is missing",
                    self.dir.display()
                )));
            }
        }

        let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)
            .map_err(|e| PersistError::Corrupt(format!("unreadable manifest: {e}")))?;

        if manifest.dimension != embedder.dimensions() {
            return Err(PersistError::Corrupt(format!(
                "snapshot dimension {} does not match embedder dimension {}",
                manifest.dimension,
                embedder.dimensions()
            )));
        }

        let bytes = fs::read(&vectors_path)?;
        if bytes.len() % size_of::<f32>() != 0 {
            return Err(PersistError::Corrupt(format!(
                "vector file length {} is not a multiple of {}",
                bytes.len(),
                size_of::<f32>()
            )));
        }
        let vectors: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);

        let expected = manifest.identities.len() * manifest.dimension;
        if vectors.len() != expected {
            return Err(PersistError::Corrupt(format!(
                "vector count {} does not match {} identities of dimension {}",
                vectors.len(),
                manifest.identities.len(),
                manifest.dimension
            )));
        }

        info!(
            entries = manifest.identities.len(),
            dir = %self.dir.display(),
            "index snapshot loaded"
        );
        Ok(Some(VectorIndex::from_parts(
            embedder,
            vectors,
            manifest.identities,
        )))
    }
}
