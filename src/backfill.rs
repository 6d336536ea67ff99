//! Backfill reconciler: regenerate missing vector entries.
//!
//! A record's vector entry is best-effort at ingest time; this maintenance
//! job closes the gap. It scans every record carrying a summary blob key,
//! re-reads the summary, embeds it, and upserts vectors in bounded batches.
//! Per-record failures are collected and the scan continues; the job is
//! built for maximum forward progress, never an early abort.

use std::sync::Arc;

use serde::Serialize;

use crate::semantic::{SemanticService, VectorUpsert};
use crate::store::{BlobStore, MetadataError, MetadataStore};

#[derive(Debug, Default, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub summaries_found: usize,
    pub embeddings_generated: usize,
    pub vectors_upserted: usize,
    pub errors: Vec<String>,
}

pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    semantic: Arc<SemanticService>,
    batch_size: usize,
}

impl Reconciler {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        semantic: Arc<SemanticService>,
        batch_size: usize,
    ) -> Self {
        Self {
            metadata,
            blobs,
            semantic,
            batch_size: batch_size.max(1),
        }
    }

    /// Run one full reconciliation pass. Only the initial scan can fail;
    /// everything after degrades into the report's error list.
    pub fn run(&self) -> Result<BackfillReport, MetadataError> {
        let records = self.metadata.scan_with_summary()?;

        let mut report = BackfillReport {
            scanned: records.len(),
            ..Default::default()
        };
        let mut batch: Vec<VectorUpsert> = Vec::with_capacity(self.batch_size);

        for record in &records {
            let key = match record.summary_key.as_deref() {
                Some(key) => key,
                None => continue,
            };

            let summary = match self.blobs.get(key) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    report
                        .errors
                        .push(format!("{}: summary blob missing: {err}", record.id));
                    continue;
                }
            };
            report.summaries_found += 1;

            let vector = match self.semantic.embed(&summary) {
                Ok(Some(vector)) => vector,
                Ok(None) => {
                    report
                        .errors
                        .push(format!("{}: no embedding available", record.id));
                    continue;
                }
                Err(err) => {
                    report
                        .errors
                        .push(format!("{}: embedding failed: {err}", record.id));
                    continue;
                }
            };
            report.embeddings_generated += 1;

            batch.push(VectorUpsert {
                id: record.id.to_string(),
                vector,
            });
            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report);
            }
        }

        self.flush(&mut batch, &mut report);

        log::info!(
            "backfill: scanned={} summaries={} embedded={} upserted={} errors={}",
            report.scanned,
            report.summaries_found,
            report.embeddings_generated,
            report.vectors_upserted,
            report.errors.len()
        );
        Ok(report)
    }

    fn flush(&self, batch: &mut Vec<VectorUpsert>, report: &mut BackfillReport) {
        if batch.is_empty() {
            return;
        }
        let entries = std::mem::take(batch);
        let count = entries.len();
        match self.semantic.upsert(entries) {
            Ok(()) => report.vectors_upserted += count,
            Err(err) => report.errors.push(format!("batch upsert failed: {err}")),
        }
    }
}
