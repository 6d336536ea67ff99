//! Ingestion pipeline for captured page visits.
//!
//! Sequence per request: validate, exact-hash duplicate check, SimHash
//! near-duplicate check against the latest record for the same URL,
//! enrichment (with fallback), then the persistence stages.
//!
//! Persistence stages carry explicit tolerance levels. The content blob and
//! the metadata insert are `Fatal`: without the raw text the record is
//! meaningless, and the page may no longer be reachable to re-capture it.
//! The summary blob and the vector upsert are `BestEffort`: both can be
//! regenerated later by the backfill reconciler, so their failure degrades
//! the record instead of failing the visit.

use std::sync::Arc;

use crate::config::{EnrichmentConfig, FingerprintConfig};
use crate::eid::VisitId;
use crate::enrich::{self, Summarizer};
use crate::fingerprint::{exact_hash, hamming_distance, Fingerprinter};
use crate::semantic::{SemanticService, VectorUpsert};
use crate::store::{BlobStore, MetadataError, MetadataStore};
use crate::visit::{ActivityRecord, ValidationError, VisitCapture};

/// Terminal outcome of one ingestion request. Duplicates are normal
/// outcomes, not errors.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Committed { id: VisitId },
    Duplicate { existing_id: VisitId },
    NearDuplicate { existing_id: VisitId, distance: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("essential storage failure at {stage}: {source:?}")]
    Storage {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure tolerance of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagePolicy {
    Fatal,
    BestEffort,
}

/// Run one side-effect stage under its policy. A `Fatal` failure aborts the
/// pipeline; a `BestEffort` failure is logged and yields `None`.
fn run_stage<T>(
    name: &'static str,
    policy: StagePolicy,
    op: impl FnOnce() -> anyhow::Result<T>,
) -> Result<Option<T>, IngestError> {
    match op() {
        Ok(value) => Ok(Some(value)),
        Err(source) => match policy {
            StagePolicy::Fatal => Err(IngestError::Storage {
                stage: name,
                source,
            }),
            StagePolicy::BestEffort => {
                log::warn!("best-effort stage '{name}' failed, continuing: {source:#}");
                Ok(None)
            }
        },
    }
}

pub struct Ingestor {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    summarizer: Arc<dyn Summarizer>,
    semantic: Arc<SemanticService>,
    fingerprinter: Fingerprinter,
    near_duplicate_threshold: u32,
    enrichment: EnrichmentConfig,
}

impl Ingestor {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        summarizer: Arc<dyn Summarizer>,
        semantic: Arc<SemanticService>,
        fingerprint_config: &FingerprintConfig,
        enrichment_config: &EnrichmentConfig,
    ) -> Self {
        Self {
            metadata,
            blobs,
            summarizer,
            semantic,
            fingerprinter: Fingerprinter::new(fingerprint_config),
            near_duplicate_threshold: fingerprint_config.near_duplicate_threshold,
            enrichment: enrichment_config.clone(),
        }
    }

    pub fn ingest(&self, capture: VisitCapture) -> Result<IngestOutcome, IngestError> {
        capture.validate()?;

        let text = capture.text_content.as_deref().unwrap_or_default();
        let content_hash = exact_hash(text);

        // Exact duplicate: same bytes already committed, regardless of URL.
        let existing = run_stage("metadata.find_by_hash", StagePolicy::Fatal, || {
            self.metadata
                .find_by_hash(&content_hash)
                .map_err(anyhow::Error::from)
        })?
        .flatten();
        if let Some(existing) = existing {
            log::debug!("exact duplicate of {} for {}", existing.id, capture.url);
            return Ok(IngestOutcome::Duplicate {
                existing_id: existing.id,
            });
        }

        // Near-duplicate: only compared against the most recent record for
        // the same URL, not the whole corpus.
        let content_simhash = self.fingerprinter.simhash(text);
        let latest = run_stage("metadata.latest_for_url", StagePolicy::Fatal, || {
            self.metadata
                .latest_for_url(&capture.url)
                .map_err(anyhow::Error::from)
        })?
        .flatten();
        if let Some(latest) = latest {
            let distance = hamming_distance(&content_simhash, &latest.content_simhash);
            if distance <= self.near_duplicate_threshold {
                log::debug!(
                    "near-duplicate of {} for {} (distance {distance})",
                    latest.id,
                    capture.url
                );
                return Ok(IngestOutcome::NearDuplicate {
                    existing_id: latest.id,
                    distance,
                });
            }
        }

        // Enrichment never aborts ingestion; it degrades to the fallback.
        let summary = enrich::enrich(self.summarizer.as_ref(), text, &self.enrichment);

        let id = capture
            .id
            .clone()
            .map(VisitId::from)
            .unwrap_or_default();
        let content_key = ActivityRecord::content_key_for(&id);
        let summary_key = ActivityRecord::summary_key_for(&id);

        run_stage("blob.content", StagePolicy::Fatal, || {
            self.blobs
                .put(&content_key, text.as_bytes())
                .map_err(anyhow::Error::from)
        })?;

        let summary_stored = run_stage("blob.summary", StagePolicy::BestEffort, || {
            self.blobs
                .put(&summary_key, summary.text.as_bytes())
                .map_err(anyhow::Error::from)
        })?;

        let record = ActivityRecord {
            id: id.clone(),
            url: capture.url.clone(),
            title: capture.title.clone(),
            start_ts_ms: capture.start_timestamp.unwrap_or_default(),
            end_ts_ms: capture.end_timestamp,
            time_spent_secs: capture.time_spent_secs(),
            max_scroll_percent: capture.max_scroll_percent.unwrap_or(0),
            tags: summary.tags.clone(),
            summary_key: summary_stored.map(|_| summary_key),
            content_key,
            processed_at_ms: chrono::Utc::now().timestamp_millis(),
            content_hash,
            content_simhash,
        };

        // The unique-hash constraint is the real duplicate backstop; a
        // conflict here means a concurrent request won the race.
        match self.metadata.insert(record) {
            Ok(()) => {}
            Err(MetadataError::DuplicateHash(existing_id)) => {
                return Ok(IngestOutcome::Duplicate { existing_id });
            }
            Err(err) => {
                return Err(IngestError::Storage {
                    stage: "metadata.insert",
                    source: err.into(),
                });
            }
        }

        if summary.is_embeddable() {
            run_stage("vector.upsert", StagePolicy::BestEffort, || {
                match self.semantic.embed(&summary.text)? {
                    Some(vector) => {
                        self.semantic.upsert(vec![VectorUpsert {
                            id: id.to_string(),
                            vector,
                        }])?;
                        Ok(())
                    }
                    None => {
                        log::debug!("no embedding available for {id}, leaving to backfill");
                        Ok(())
                    }
                }
            })?;
        }

        log::info!("committed visit {id} for {}", capture.url);
        Ok(IngestOutcome::Committed { id })
    }
}
