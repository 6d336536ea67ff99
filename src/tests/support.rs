//! In-memory fakes and builders shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::app::App;
use crate::config::Config;
use crate::eid::VisitId;
use crate::enrich::{Summarizer, SummaryPayload};
use crate::semantic::{Embedder, EmbeddingError, SemanticService};
use crate::store::{BlobStore, MetadataError, MetadataStore};
use crate::visit::{ActivityRecord, VisitCapture};

/// In-memory metadata table with the same unique-hash backstop as the CSV
/// backend.
#[derive(Default)]
pub struct MemMetadata {
    records: RwLock<Vec<ActivityRecord>>,
}

impl MetadataStore for MemMetadata {
    fn insert(&self, record: ActivityRecord) -> Result<(), MetadataError> {
        let mut records = self.records.write().unwrap();
        if let Some(existing) = records.iter().find(|r| r.content_hash == record.content_hash) {
            return Err(MetadataError::DuplicateHash(existing.id.clone()));
        }
        records.push(record);
        Ok(())
    }

    fn find_by_hash(&self, content_hash: &str) -> Result<Option<ActivityRecord>, MetadataError> {
        let records = self.records.read().unwrap();
        Ok(records.iter().find(|r| r.content_hash == content_hash).cloned())
    }

    fn latest_for_url(&self, url: &str) -> Result<Option<ActivityRecord>, MetadataError> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.url == url)
            .max_by_key(|r| r.end_ts_ms.unwrap_or(r.start_ts_ms))
            .cloned())
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<ActivityRecord>, MetadataError> {
        let records = self.records.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| ids.iter().any(|id| id == r.id.as_str()))
            .cloned()
            .collect())
    }

    fn scan_with_summary(&self) -> Result<Vec<ActivityRecord>, MetadataError> {
        let records = self.records.read().unwrap();
        Ok(records.iter().filter(|r| r.summary_key.is_some()).cloned().collect())
    }

    fn total(&self) -> Result<usize, MetadataError> {
        Ok(self.records.read().unwrap().len())
    }
}

/// In-memory blob store. `fail_suffix` makes every put whose key ends with
/// that suffix fail, to exercise per-stage failure handling.
#[derive(Default)]
pub struct MemBlobs {
    data: RwLock<HashMap<String, Vec<u8>>>,
    fail_suffix: Option<&'static str>,
}

impl MemBlobs {
    pub fn failing_puts_for(suffix: &'static str) -> Self {
        MemBlobs {
            data: RwLock::new(HashMap::new()),
            fail_suffix: Some(suffix),
        }
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.data.write().unwrap().insert(key.to_string(), data.to_vec());
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }
}

impl BlobStore for MemBlobs {
    fn put(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        if let Some(suffix) = self.fail_suffix {
            if key.ends_with(suffix) {
                return Err(std::io::Error::other("injected put failure"));
            }
        }
        self.insert(key, data);
        Ok(())
    }

    fn get(&self, key: &str) -> std::io::Result<Vec<u8>> {
        self.data
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, key.to_string()))
    }

    fn exists(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    fn delete(&self, key: &str) -> std::io::Result<()> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }
}

pub enum StubSummarizer {
    Ok,
    Failing,
}

impl Summarizer for StubSummarizer {
    fn summarize(&self, _text: &str) -> anyhow::Result<SummaryPayload> {
        match self {
            StubSummarizer::Ok => Ok(SummaryPayload {
                summary: "A concise summary of the page.".to_string(),
                tags: vec!["alpha".to_string(), "beta".to_string()],
            }),
            StubSummarizer::Failing => anyhow::bail!("summarization endpoint down"),
        }
    }
}

/// Deterministic 3-dim embedder. Texts listed in `mapping` get their fixed
/// vector; anything else gets a byte-sum-derived one. Counts calls so tests
/// can assert the model was never reached.
pub struct StubEmbedder {
    mapping: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    fail: bool,
}

impl StubEmbedder {
    pub fn new() -> Self {
        StubEmbedder {
            mapping: HashMap::new(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        StubEmbedder {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_mapping(mapping: &[(&str, [f32; 3])]) -> Self {
        StubEmbedder {
            mapping: mapping
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.to_vec()))
                .collect(),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for StubEmbedder {
    fn name(&self) -> &str {
        "stub-model"
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::EmbeddingFailed("injected failure".to_string()));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        if let Some(vector) = self.mapping.get(text) {
            return Ok(Some(vector.clone()));
        }
        let sum: u32 = text.bytes().map(u32::from).sum();
        Ok(Some(vec![1.0, (sum % 7) as f32, (sum % 13) as f32]))
    }
}

/// Fully-wired app over in-memory backends, with handles kept so tests can
/// inspect side effects directly.
pub struct Harness {
    pub app: App,
    pub metadata: Arc<MemMetadata>,
    pub blobs: Arc<MemBlobs>,
    pub semantic: Arc<SemanticService>,
    pub embedder: Arc<StubEmbedder>,
}

pub fn harness(
    config: Config,
    summarizer: StubSummarizer,
    blobs: MemBlobs,
    embedder: StubEmbedder,
) -> Harness {
    let metadata = Arc::new(MemMetadata::default());
    let blobs = Arc::new(blobs);
    let embedder = Arc::new(embedder);
    let semantic = Arc::new(
        SemanticService::new(embedder.clone(), None).expect("in-memory semantic service"),
    );

    let app = App::assemble(
        config,
        metadata.clone(),
        blobs.clone(),
        Arc::new(summarizer),
        semantic.clone(),
    );

    Harness {
        app,
        metadata,
        blobs,
        semantic,
        embedder,
    }
}

pub fn default_harness() -> Harness {
    harness(
        Config::with_base_path(String::new()),
        StubSummarizer::Ok,
        MemBlobs::default(),
        StubEmbedder::new(),
    )
}

pub fn capture(url: &str, text: &str) -> VisitCapture {
    VisitCapture {
        url: url.to_string(),
        title: Some("A page".to_string()),
        start_timestamp: Some(1_700_000_000_000),
        end_timestamp: Some(1_700_000_060_000),
        text_content: Some(text.to_string()),
        ..Default::default()
    }
}

pub fn committed_record(id: &str, url: &str, hash: &str, summary_key: Option<&str>) -> ActivityRecord {
    ActivityRecord {
        id: VisitId::from(id),
        url: url.to_string(),
        title: None,
        start_ts_ms: 1_700_000_000_000,
        end_ts_ms: Some(1_700_000_060_000),
        time_spent_secs: 60,
        max_scroll_percent: 50,
        tags: vec![],
        summary_key: summary_key.map(str::to_string),
        content_key: format!("{id}.content.txt"),
        processed_at_ms: 1_700_000_060_000,
        content_hash: hash.to_string(),
        content_simhash: "0badcafe".to_string(),
    }
}
