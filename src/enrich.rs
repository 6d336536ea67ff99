//! AI enrichment: summary + topic tags for novel page content.
//!
//! The summarization endpoint is an external collaborator; every failure
//! mode (transport error, malformed JSON, missing or mistyped fields) is
//! treated uniformly and recovered locally with a deterministic fallback.
//! Enrichment can degrade an ingested record but never abort it.

use serde::Deserialize;

use crate::config::EnrichmentConfig;

/// Literal marker appended to fallback summaries. Also used to recognize a
/// degraded summary later (e.g. when deciding what to embed).
pub const FALLBACK_MARKER: &str = "[summary unavailable]";

/// Raw model output: a JSON object with exactly these fields. Anything
/// else (missing field, wrong type) fails deserialization and becomes a
/// uniform enrichment failure.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryPayload {
    pub summary: String,
    pub tags: Vec<String>,
}

/// Enrichment result as consumed by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub tags: Vec<String>,
    /// True when the text is the deterministic fallback, not model output.
    pub degraded: bool,
}

impl Summary {
    pub fn is_embeddable(&self) -> bool {
        !self.degraded && !self.text.trim().is_empty()
    }
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> anyhow::Result<SummaryPayload>;
}

/// Truncate to at most `max` characters, respecting char boundaries.
/// Plain slicing, not sentence-aware: this bounds latency and model cost.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// Run enrichment with fallback. The input is sliced to the configured
/// maximum first; any summarizer failure yields the fallback summary
/// (preview of the sliced input plus marker) and an empty tag list.
pub fn enrich(summarizer: &dyn Summarizer, text: &str, config: &EnrichmentConfig) -> Summary {
    let input = truncate_chars(text, config.summary_max_input_chars);

    match summarizer.summarize(&input) {
        Ok(payload) => Summary {
            text: payload.summary,
            tags: payload.tags,
            degraded: false,
        },
        Err(err) => {
            log::warn!("summarization failed, using fallback: {err:#}");
            fallback_summary(&input, config)
        }
    }
}

fn fallback_summary(input: &str, config: &EnrichmentConfig) -> Summary {
    let preview = truncate_chars(input, config.fallback_preview_chars);
    Summary {
        text: format!("{preview} {FALLBACK_MARKER}"),
        tags: Vec::new(),
        degraded: true,
    }
}

/// Summarizer backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiSummarizer {
    client: reqwest::blocking::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

const SYSTEM_PROMPT: &str = "You summarize web pages a user visited. Respond with a JSON object \
     containing a \"summary\" field (one paragraph, plain text) and a \
     \"tags\" field (an array of 2 to 7 short lowercase topic tags).";

impl OpenAiSummarizer {
    pub fn new(config: &EnrichmentConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_base: config.summary_api_base.trim_end_matches('/').to_string(),
            model: config.summary_model.clone(),
            api_key: std::env::var("RETRACE_API_KEY").ok(),
        }
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, text: &str) -> anyhow::Result<SummaryPayload> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp: serde_json::Value = req.send()?.error_for_status()?.json()?;

        let content = resp
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("response has no message content"))?;

        let payload: SummaryPayload = serde_json::from_str(content)?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OkSummarizer;
    impl Summarizer for OkSummarizer {
        fn summarize(&self, _text: &str) -> anyhow::Result<SummaryPayload> {
            Ok(SummaryPayload {
                summary: "A page about things.".to_string(),
                tags: vec!["things".to_string(), "pages".to_string()],
            })
        }
    }

    struct FailingSummarizer;
    impl Summarizer for FailingSummarizer {
        fn summarize(&self, _text: &str) -> anyhow::Result<SummaryPayload> {
            anyhow::bail!("model endpoint unreachable")
        }
    }

    /// Records the input it was given, to assert on truncation.
    struct CapturingSummarizer(std::sync::Mutex<Option<String>>);
    impl Summarizer for CapturingSummarizer {
        fn summarize(&self, text: &str) -> anyhow::Result<SummaryPayload> {
            *self.0.lock().unwrap() = Some(text.to_string());
            anyhow::bail!("always fails")
        }
    }

    #[test]
    fn test_successful_enrichment_passes_through() {
        let summary = enrich(&OkSummarizer, "some page text", &EnrichmentConfig::default());
        assert_eq!(summary.text, "A page about things.");
        assert_eq!(summary.tags.len(), 2);
        assert!(!summary.degraded);
        assert!(summary.is_embeddable());
    }

    #[test]
    fn test_failure_yields_fallback_with_marker_and_empty_tags() {
        let summary = enrich(
            &FailingSummarizer,
            "the original page text goes here",
            &EnrichmentConfig::default(),
        );
        assert!(summary.degraded);
        assert!(summary.tags.is_empty());
        assert!(summary.text.ends_with(FALLBACK_MARKER));
        assert!(summary.text.starts_with("the original page text goes here"));
        assert!(!summary.is_embeddable());
    }

    #[test]
    fn test_fallback_preview_is_truncated() {
        let config = EnrichmentConfig {
            fallback_preview_chars: 10,
            ..Default::default()
        };
        let summary = enrich(&FailingSummarizer, &"x".repeat(500), &config);
        assert_eq!(summary.text, format!("{} {FALLBACK_MARKER}", "x".repeat(10)));
    }

    #[test]
    fn test_input_sliced_before_model_call() {
        let config = EnrichmentConfig {
            summary_max_input_chars: 100,
            fallback_preview_chars: 50,
            ..Default::default()
        };
        let capturing = CapturingSummarizer(std::sync::Mutex::new(None));
        let _ = enrich(&capturing, &"y".repeat(5_000), &config);

        let seen = capturing.0.lock().unwrap().clone().unwrap();
        assert_eq!(seen.chars().count(), 100);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn test_payload_rejects_missing_fields() {
        assert!(serde_json::from_str::<SummaryPayload>(r#"{"summary": "s"}"#).is_err());
        assert!(serde_json::from_str::<SummaryPayload>(r#"{"tags": []}"#).is_err());
        assert!(serde_json::from_str::<SummaryPayload>(r#"{"summary": 3, "tags": []}"#).is_err());
        assert!(
            serde_json::from_str::<SummaryPayload>(r#"{"summary": "s", "tags": ["a"]}"#).is_ok()
        );
    }
}
