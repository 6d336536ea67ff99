//! Storage adapters.
//!
//! - `blobs`: key/value byte store for full text content and summaries
//! - `metadata`: the relational activity-record table
//!
//! Both are consumed through narrow traits so the pipelines can be tested
//! against in-memory fakes and the backends can be swapped out.

pub mod blobs;
pub mod metadata;

pub use blobs::{BlobBackendLocal, BlobStore};
pub use metadata::{MetadataBackendCsv, MetadataError, MetadataStore};
