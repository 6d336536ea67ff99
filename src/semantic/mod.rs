//! Semantic retrieval infrastructure.
//!
//! - `embeddings`: `Embedder` trait + fastembed-backed implementation
//! - `index`: in-memory vector index with cosine top-k queries
//! - `storage`: binary file I/O for vectors.bin persistence
//! - `service`: glue over embedder + index + storage used by the pipelines
//!
//! A record's vector entry is best-effort relative to its metadata row: it
//! may arrive later (via backfill) or never (embedding failure), and the
//! rest of the system must not treat its absence as an error.

pub mod embeddings;
pub mod index;
pub mod service;
pub mod storage;

pub use embeddings::{Embedder, EmbeddingError, FastembedEmbedder};
pub use index::{IndexError, QueryHit, VectorIndex, VectorUpsert};
pub use service::{SemanticError, SemanticService};
pub use storage::{VectorStorage, VectorStorageError};
