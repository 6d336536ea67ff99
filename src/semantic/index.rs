//! In-memory vector index with cosine top-k queries.

use std::collections::HashMap;

/// One upsert: record id plus its embedding.
#[derive(Debug, Clone)]
pub struct VectorUpsert {
    pub id: String,
    pub vector: Vec<f32>,
}

/// One query hit, scored by cosine similarity.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub score: f32,
}

/// Nearest-neighbor index over record embeddings.
///
/// Keyed by record id; upserts replace any existing entry for the id.
pub struct VectorIndex {
    entries: HashMap<String, Vec<f32>>,
    dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Vec<f32>> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f32>)> {
        self.entries.iter()
    }

    /// Insert or replace entries. Rejects wrong-dimension and zero-norm
    /// vectors; entries before the failing one remain applied.
    pub fn upsert(&mut self, entries: Vec<VectorUpsert>) -> Result<(), IndexError> {
        for entry in entries {
            if entry.vector.len() != self.dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimensions,
                    got: entry.vector.len(),
                });
            }
            if l2_norm(&entry.vector) < f32::EPSILON {
                return Err(IndexError::ZeroNormVector);
            }
            self.entries.insert(entry.id, entry.vector);
        }
        Ok(())
    }

    /// Top-k nearest neighbors by cosine similarity, highest score first.
    pub fn query(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut hits: Vec<QueryHit> = self
            .entries
            .iter()
            .map(|(id, vector)| QueryHit {
                id: id.clone(),
                score: cosine_similarity(query, vector, query_norm),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Bulk load entries. Used when loading from storage; entries that fail
    /// to insert (e.g. zero norm) are skipped.
    pub fn bulk_load(&mut self, entries: Vec<VectorUpsert>) {
        for entry in entries {
            let _ = self.upsert(vec![entry]);
        }
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}
