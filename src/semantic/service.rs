//! Service tying the embedder, vector index, and persistence together.
//!
//! The ingestion and retrieval pipelines only see this surface: embed text,
//! upsert vector entries, query top-k. The index is held behind a `Mutex`;
//! each upsert batch is persisted before the call returns.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::semantic::embeddings::{model_id_hash, Embedder, EmbeddingError};
use crate::semantic::index::{IndexError, QueryHit, VectorIndex, VectorUpsert};
use crate::semantic::storage::{VectorStorage, VectorStorageError};

#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub struct SemanticService {
    embedder: std::sync::Arc<dyn Embedder>,
    index: Mutex<VectorIndex>,
    storage: Option<VectorStorage>,
    model_id: [u8; 32],
}

impl SemanticService {
    /// Build the service, loading the persisted index when present.
    ///
    /// A model or format change in the stored file yields a fresh index
    /// (the backfill reconciler repopulates it); corruption propagates.
    pub fn new(
        embedder: std::sync::Arc<dyn Embedder>,
        vectors_path: Option<PathBuf>,
    ) -> Result<Self, SemanticError> {
        let model_id = model_id_hash(embedder.name());
        let dimensions = embedder.dimensions();
        let storage = vectors_path.map(VectorStorage::new);

        let index = match &storage {
            Some(storage) if storage.exists() => match storage.load(&model_id, dimensions) {
                Ok(index) => {
                    log::info!("loaded {} vectors from storage", index.len());
                    index
                }
                Err(VectorStorageError::ModelMismatch) => {
                    log::warn!("embedding model changed, creating fresh index");
                    VectorIndex::new(dimensions)
                }
                Err(VectorStorageError::VersionMismatch(file_ver, _)) => {
                    log::warn!("vector storage version {file_ver} unsupported, creating fresh index");
                    VectorIndex::new(dimensions)
                }
                Err(err) => {
                    log::error!("failed to load vectors: {err}");
                    return Err(err.into());
                }
            },
            _ => VectorIndex::new(dimensions),
        };

        Ok(Self {
            embedder,
            index: Mutex::new(index),
            storage,
            model_id,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn indexed_count(&self) -> usize {
        self.index
            .lock()
            .map(|index| index.len())
            .unwrap_or(0)
    }

    /// Embed a text. `Ok(None)` means no embedding is available for this
    /// input; callers decide whether that is tolerable.
    pub fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, SemanticError> {
        Ok(self.embedder.embed(text)?)
    }

    /// Apply an upsert batch and persist the index.
    pub fn upsert(&self, entries: Vec<VectorUpsert>) -> Result<(), SemanticError> {
        let mut index = self
            .index
            .lock()
            .map_err(|e| SemanticError::Internal(format!("index lock poisoned: {e}")))?;

        index.upsert(entries)?;

        if let Some(storage) = &self.storage {
            storage.save(&index, &self.model_id)?;
        }
        Ok(())
    }

    /// Top-k nearest neighbors for a query vector.
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>, SemanticError> {
        let index = self
            .index
            .lock()
            .map_err(|e| SemanticError::Internal(format!("index lock poisoned: {e}")))?;

        Ok(index.query(vector, top_k)?)
    }
}
