use crate::eid::VisitId;
use serde::{Deserialize, Serialize};

/// Incoming page-visit payload as produced by the capture client.
/// Field names are camelCase on the wire.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitCapture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub start_timestamp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_scroll_percent: Option<u8>,

    pub text_content: Option<String>,
}

impl VisitCapture {
    /// Required-field validation. Runs before any store or model call.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingField("url"));
        }
        if url::Url::parse(&self.url).is_err() {
            return Err(ValidationError::InvalidUrl(self.url.clone()));
        }
        match self.start_timestamp {
            None => return Err(ValidationError::MissingField("startTimestamp")),
            Some(ts) if ts <= 0 => {
                return Err(ValidationError::InvalidTimestamp(ts));
            }
            Some(_) => {}
        }
        match &self.text_content {
            None => return Err(ValidationError::MissingField("textContent")),
            Some(text) if text.trim().is_empty() => {
                return Err(ValidationError::MissingField("textContent"));
            }
            Some(_) => {}
        }
        if let Some(pct) = self.max_scroll_percent {
            if pct > 100 {
                return Err(ValidationError::InvalidScrollPercent(pct));
            }
        }
        Ok(())
    }

    /// Seconds between start and end, unless the client supplied its own.
    pub fn time_spent_secs(&self) -> u64 {
        if let Some(secs) = self.time_spent_seconds {
            return secs;
        }
        match (self.start_timestamp, self.end_timestamp) {
            (Some(start), Some(end)) if end > start => ((end - start) / 1000) as u64,
            _ => 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("not a valid url: {0}")]
    InvalidUrl(String),

    #[error("startTimestamp must be a positive epoch-millisecond value, got {0}")]
    InvalidTimestamp(i64),

    #[error("maxScrollPercent must be between 0 and 100, got {0}")]
    InvalidScrollPercent(u8),
}

/// One committed page visit. Append-only; never mutated or deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: VisitId,
    pub url: String,
    pub title: Option<String>,
    pub start_ts_ms: i64,
    pub end_ts_ms: Option<i64>,
    pub time_spent_secs: u64,
    pub max_scroll_percent: u8,
    pub tags: Vec<String>,
    /// Blob key of the AI summary; absent when the summary write failed.
    pub summary_key: Option<String>,
    /// Blob key of the full extracted text.
    pub content_key: String,
    pub processed_at_ms: i64,
    /// SHA-256 of the raw text, lowercase hex.
    pub content_hash: String,
    /// 8-hex-digit SimHash signature. Always present once committed.
    pub content_simhash: String,
}

impl ActivityRecord {
    pub fn content_key_for(id: &VisitId) -> String {
        format!("{id}.content.txt")
    }

    pub fn summary_key_for(id: &VisitId) -> String {
        format!("{id}.summary.txt")
    }
}
