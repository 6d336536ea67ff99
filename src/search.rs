//! Semantic retrieval over committed visits.
//!
//! Unlike ingestion, retrieval fails loudly: a degraded search result would
//! be silently wrong, so embedding or index failures surface to the caller
//! instead of being absorbed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::semantic::{SemanticError, SemanticService};
use crate::store::{BlobStore, MetadataError, MetadataStore};
use crate::visit::ActivityRecord;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: ActivityRecord,
    /// Similarity score from the vector index; results are ordered by this.
    pub score: f32,
    /// Inline summary text, hydrated best-effort from the blob store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Distinguishes "nothing indexed matched" from an empty result list a
/// caller might misread as an error.
#[derive(Debug)]
pub enum SearchOutcome {
    Results(Vec<SearchHit>),
    NoResults,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search query must not be empty")]
    EmptyQuery,

    #[error("no query embedding available; search cannot proceed")]
    EmbeddingUnavailable,

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

pub struct Searcher {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    semantic: Arc<SemanticService>,
    default_top_k: usize,
}

impl Searcher {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        semantic: Arc<SemanticService>,
        default_top_k: usize,
    ) -> Self {
        Self {
            metadata,
            blobs,
            semantic,
            default_top_k,
        }
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchOutcome, SearchError> {
        // Rejected before any external call.
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let top_k = top_k.unwrap_or(self.default_top_k);

        let query_vector = self
            .semantic
            .embed(query)?
            .ok_or(SearchError::EmbeddingUnavailable)?;

        let hits = self.semantic.query(&query_vector, top_k)?;
        if hits.is_empty() {
            return Ok(SearchOutcome::NoResults);
        }

        let scores: HashMap<String, f32> =
            hits.iter().map(|h| (h.id.clone(), h.score)).collect();
        let ids: Vec<String> = hits.into_iter().map(|h| h.id).collect();

        // No ordering guarantee from the metadata store.
        let records = self.metadata.get_many(&ids)?;

        let mut results: Vec<SearchHit> = records
            .into_iter()
            .filter_map(|record| {
                let score = *scores.get(record.id.as_str())?;
                let summary = self.hydrate_summary(&record);
                Some(SearchHit {
                    record,
                    score,
                    summary,
                })
            })
            .collect();

        // Final order must match the index's relevance ranking.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if results.is_empty() {
            return Ok(SearchOutcome::NoResults);
        }
        Ok(SearchOutcome::Results(results))
    }

    /// Best-effort summary fetch; a missing blob just omits the inline text.
    fn hydrate_summary(&self, record: &ActivityRecord) -> Option<String> {
        let key = record.summary_key.as_deref()?;
        match self.blobs.get(key) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => {
                log::warn!("failed to hydrate summary {key}: {err}");
                None
            }
        }
    }
}
