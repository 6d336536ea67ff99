use std::{
    io::ErrorKind,
    sync::{Arc, RwLock},
};

use crate::eid::VisitId;
use crate::visit::ActivityRecord;

/// Narrow interface over the activity-record table.
///
/// Records are append-only. `insert` enforces uniqueness of `content_hash`
/// as the backstop for the check-then-insert race: the pre-insert duplicate
/// lookup in the ingestion pipeline is an optimization, not the correctness
/// mechanism.
pub trait MetadataStore: Send + Sync {
    fn insert(&self, record: ActivityRecord) -> Result<(), MetadataError>;
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<ActivityRecord>, MetadataError>;
    /// Most recent record for a URL, ordered by end timestamp descending.
    fn latest_for_url(&self, url: &str) -> Result<Option<ActivityRecord>, MetadataError>;
    /// Point lookups by id set. No ordering guarantee.
    fn get_many(&self, ids: &[String]) -> Result<Vec<ActivityRecord>, MetadataError>;
    /// All records carrying a summary blob key, for the backfill scan.
    fn scan_with_summary(&self) -> Result<Vec<ActivityRecord>, MetadataError>;
    fn total(&self) -> Result<usize, MetadataError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("record with identical content already exists at id {0}")]
    DuplicateHash(VisitId),

    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0:?}")]
    Csv(#[from] csv::Error),

    #[error("malformed record: {0}")]
    Malformed(String),
}

const CSV_HEADERS: [&str; 13] = [
    "id",
    "url",
    "title",
    "start_ts_ms",
    "end_ts_ms",
    "time_spent_secs",
    "max_scroll_percent",
    "tags",
    "summary_key",
    "content_key",
    "processed_at_ms",
    "content_hash",
    "content_simhash",
];

/// CSV-file-backed metadata store with an in-memory cache.
///
/// The whole table is kept in memory behind an `RwLock` and rewritten
/// atomically on insert; history tables stay small enough that this is the
/// simple, durable option.
#[derive(Debug, Clone, Default)]
pub struct MetadataBackendCsv {
    list: Arc<RwLock<Vec<ActivityRecord>>>,
    path: String,
}

impl MetadataBackendCsv {
    pub fn new(path: &str) -> Result<Self, MetadataError> {
        let backend = MetadataBackendCsv {
            list: Arc::new(RwLock::new(Vec::new())),
            path: path.to_string(),
        };
        backend.load()?;
        Ok(backend)
    }

    fn load(&self) -> Result<(), MetadataError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut reader = csv::Reader::from_reader(raw.as_bytes());
        let mut records = Vec::new();
        for row in reader.records() {
            records.push(Self::record_from_row(&row?)?);
        }

        *self.list.write().expect("metadata lock poisoned") = records;
        Ok(())
    }

    fn persist(&self, records: &[ActivityRecord]) -> Result<(), MetadataError> {
        let temp_path = format!("{}-{}.tmp", self.path, VisitId::new());

        let mut writer = csv::Writer::from_path(&temp_path)?;
        writer.write_record(CSV_HEADERS)?;
        for record in records {
            writer.write_record(Self::row_from_record(record))?;
        }
        writer.flush().map_err(std::io::Error::from)?;
        drop(writer);

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn row_from_record(record: &ActivityRecord) -> Vec<String> {
        vec![
            record.id.to_string(),
            record.url.clone(),
            record.title.clone().unwrap_or_default(),
            record.start_ts_ms.to_string(),
            record.end_ts_ms.map(|v| v.to_string()).unwrap_or_default(),
            record.time_spent_secs.to_string(),
            record.max_scroll_percent.to_string(),
            record.tags.join(","),
            record.summary_key.clone().unwrap_or_default(),
            record.content_key.clone(),
            record.processed_at_ms.to_string(),
            record.content_hash.clone(),
            record.content_simhash.clone(),
        ]
    }

    fn record_from_row(row: &csv::StringRecord) -> Result<ActivityRecord, MetadataError> {
        if row.len() != CSV_HEADERS.len() {
            return Err(MetadataError::Malformed(format!(
                "expected {} columns, got {}",
                CSV_HEADERS.len(),
                row.len()
            )));
        }

        let field = |idx: usize| row.get(idx).unwrap_or_default().to_string();
        let opt = |idx: usize| {
            let value = field(idx);
            (!value.is_empty()).then_some(value)
        };
        let int = |idx: usize| {
            field(idx)
                .parse::<i64>()
                .map_err(|err| MetadataError::Malformed(format!("column {idx}: {err}")))
        };

        Ok(ActivityRecord {
            id: VisitId::from(field(0)),
            url: field(1),
            title: opt(2),
            start_ts_ms: int(3)?,
            end_ts_ms: opt(4).map(|v| v.parse::<i64>()).transpose().map_err(|err| {
                MetadataError::Malformed(format!("end_ts_ms: {err}"))
            })?,
            time_spent_secs: int(5)? as u64,
            max_scroll_percent: int(6)? as u8,
            tags: field(7)
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            summary_key: opt(8),
            content_key: field(9),
            processed_at_ms: int(10)?,
            content_hash: field(11),
            content_simhash: field(12),
        })
    }
}

impl MetadataStore for MetadataBackendCsv {
    fn insert(&self, record: ActivityRecord) -> Result<(), MetadataError> {
        let mut list = self.list.write().expect("metadata lock poisoned");

        // Unique-hash backstop, checked under the write lock.
        if let Some(existing) = list.iter().find(|r| r.content_hash == record.content_hash) {
            return Err(MetadataError::DuplicateHash(existing.id.clone()));
        }

        list.push(record);
        let result = self.persist(&list);
        if result.is_err() {
            list.pop();
        }
        result
    }

    fn find_by_hash(&self, content_hash: &str) -> Result<Option<ActivityRecord>, MetadataError> {
        let list = self.list.read().expect("metadata lock poisoned");
        Ok(list.iter().find(|r| r.content_hash == content_hash).cloned())
    }

    fn latest_for_url(&self, url: &str) -> Result<Option<ActivityRecord>, MetadataError> {
        let list = self.list.read().expect("metadata lock poisoned");
        Ok(list
            .iter()
            .filter(|r| r.url == url)
            .max_by_key(|r| r.end_ts_ms.unwrap_or(r.start_ts_ms))
            .cloned())
    }

    fn get_many(&self, ids: &[String]) -> Result<Vec<ActivityRecord>, MetadataError> {
        let list = self.list.read().expect("metadata lock poisoned");
        Ok(list
            .iter()
            .filter(|r| ids.iter().any(|id| id == r.id.as_str()))
            .cloned()
            .collect())
    }

    fn scan_with_summary(&self) -> Result<Vec<ActivityRecord>, MetadataError> {
        let list = self.list.read().expect("metadata lock poisoned");
        Ok(list.iter().filter(|r| r.summary_key.is_some()).cloned().collect())
    }

    fn total(&self) -> Result<usize, MetadataError> {
        Ok(self.list.read().expect("metadata lock poisoned").len())
    }
}
