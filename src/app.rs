//! Component wiring.
//!
//! `App` owns the stores, the enrichment client, and the semantic service,
//! and exposes the three pipelines to the CLI and the web layer. All
//! methods take `&self`; the components synchronize internally, so one
//! `Arc<App>` is shared across requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backfill::{BackfillReport, Reconciler};
use crate::config::Config;
use crate::enrich::{OpenAiSummarizer, Summarizer};
use crate::ingest::{IngestError, IngestOutcome, Ingestor};
use crate::search::{SearchError, SearchOutcome, Searcher};
use crate::semantic::{Embedder, FastembedEmbedder, SemanticService};
use crate::store::{
    BlobBackendLocal, BlobStore, MetadataBackendCsv, MetadataError, MetadataStore,
};
use crate::visit::VisitCapture;

pub struct App {
    config: Config,
    metadata: Arc<dyn MetadataStore>,
    ingestor: Ingestor,
    searcher: Searcher,
    reconciler: Reconciler,
}

impl App {
    /// Open the app with local backends under the config base path:
    /// `activity.csv`, `blobs/`, `vectors.bin`, and the model cache.
    pub fn open(config: Config) -> anyhow::Result<App> {
        let base = config.base_path().to_string();

        let metadata: Arc<dyn MetadataStore> =
            Arc::new(MetadataBackendCsv::new(&format!("{base}/activity.csv"))?);
        let blobs: Arc<dyn BlobStore> = Arc::new(BlobBackendLocal::new(&format!("{base}/blobs"))?);

        let embedder: Arc<dyn Embedder> = Arc::new(FastembedEmbedder::new(
            &config.semantic.model,
            PathBuf::from(&base),
            config.enrichment.embed_max_chars,
            Some(Duration::from_secs(config.semantic.download_timeout_secs)),
        )?);
        let semantic = Arc::new(SemanticService::new(
            embedder,
            Some(PathBuf::from(format!("{base}/vectors.bin"))),
        )?);

        let summarizer: Arc<dyn Summarizer> = Arc::new(OpenAiSummarizer::new(&config.enrichment));

        Ok(Self::assemble(config, metadata, blobs, summarizer, semantic))
    }

    /// Assemble from pre-built components. Used by `open` and by tests,
    /// which supply in-memory stores and stub models.
    pub fn assemble(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        summarizer: Arc<dyn Summarizer>,
        semantic: Arc<SemanticService>,
    ) -> App {
        let ingestor = Ingestor::new(
            metadata.clone(),
            blobs.clone(),
            summarizer,
            semantic.clone(),
            &config.fingerprint,
            &config.enrichment,
        );
        let searcher = Searcher::new(
            metadata.clone(),
            blobs.clone(),
            semantic.clone(),
            config.semantic.default_top_k,
        );
        let reconciler = Reconciler::new(
            metadata.clone(),
            blobs,
            semantic,
            config.semantic.backfill_batch_size,
        );

        App {
            config,
            metadata,
            ingestor,
            searcher,
            reconciler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ingest(&self, capture: VisitCapture) -> Result<IngestOutcome, IngestError> {
        self.ingestor.ingest(capture)
    }

    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchOutcome, SearchError> {
        self.searcher.search(query, top_k)
    }

    pub fn backfill(&self) -> Result<BackfillReport, MetadataError> {
        self.reconciler.run()
    }

    pub fn total(&self) -> Result<usize, MetadataError> {
        self.metadata.total()
    }
}
