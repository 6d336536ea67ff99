//! Pipeline tests wiring the real ingestion, search, and backfill logic to
//! in-memory stores and stub models.

mod ingest;
pub mod support;
