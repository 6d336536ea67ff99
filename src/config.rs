use serde::{Deserialize, Serialize};

const DEFAULT_SHINGLE_SIZE: usize = 4;
const DEFAULT_MAX_FEATURES: usize = 128;
/// The original capture pipeline used both 5 and 10 for this threshold in
/// different code paths. We ship the stricter value; set 10 to match the
/// looser behavior.
const DEFAULT_NEAR_DUPLICATE_THRESHOLD: u32 = 5;

const DEFAULT_SUMMARY_MAX_INPUT_CHARS: usize = 15_000;
const DEFAULT_FALLBACK_PREVIEW_CHARS: usize = 200;
const DEFAULT_EMBED_MAX_CHARS: usize = 2_000;
const DEFAULT_SUMMARY_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SUMMARY_API_BASE: &str = "https://api.openai.com/v1";

/// Default embedding model (bge-base offers +13% accuracy vs MiniLM)
const DEFAULT_EMBED_MODEL: &str = "bge-base-en-v1.5";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BACKFILL_BATCH_SIZE: usize = 100;
const DEFAULT_TOP_K: usize = 10;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8607";

/// Tunables for the fingerprint engine. Immutable once the daemon is up;
/// passed by reference into `Fingerprinter` so tests can exercise edge
/// thresholds deterministically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Character width of each shingle.
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,

    /// Cap on retained per-shingle hashes (lowest values kept).
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Hamming distance at or below which a visit counts as a re-visit of
    /// the latest record for the same URL.
    #[serde(default = "default_near_duplicate_threshold")]
    pub near_duplicate_threshold: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            shingle_size: DEFAULT_SHINGLE_SIZE,
            max_features: DEFAULT_MAX_FEATURES,
            near_duplicate_threshold: DEFAULT_NEAR_DUPLICATE_THRESHOLD,
        }
    }
}

fn default_shingle_size() -> usize {
    DEFAULT_SHINGLE_SIZE
}

fn default_max_features() -> usize {
    DEFAULT_MAX_FEATURES
}

fn default_near_duplicate_threshold() -> u32 {
    DEFAULT_NEAR_DUPLICATE_THRESHOLD
}

/// Configuration for the summarization endpoint and input bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Input slice handed to the summarization model, in characters.
    /// Simple slicing, not sentence-aware; bounds latency and model cost.
    #[serde(default = "default_summary_max_input_chars")]
    pub summary_max_input_chars: usize,

    /// Length of the original-text preview used in the fallback summary.
    #[serde(default = "default_fallback_preview_chars")]
    pub fallback_preview_chars: usize,

    /// Input slice for embedding generation, chosen to stay under the
    /// embedding model's token window.
    #[serde(default = "default_embed_max_chars")]
    pub embed_max_chars: usize,

    /// Chat model used for summary + tags.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// OpenAI-compatible API base. The key is read from `RETRACE_API_KEY`.
    #[serde(default = "default_summary_api_base")]
    pub summary_api_base: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            summary_max_input_chars: DEFAULT_SUMMARY_MAX_INPUT_CHARS,
            fallback_preview_chars: DEFAULT_FALLBACK_PREVIEW_CHARS,
            embed_max_chars: DEFAULT_EMBED_MAX_CHARS,
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            summary_api_base: DEFAULT_SUMMARY_API_BASE.to_string(),
        }
    }
}

fn default_summary_max_input_chars() -> usize {
    DEFAULT_SUMMARY_MAX_INPUT_CHARS
}

fn default_fallback_preview_chars() -> usize {
    DEFAULT_FALLBACK_PREVIEW_CHARS
}

fn default_embed_max_chars() -> usize {
    DEFAULT_EMBED_MAX_CHARS
}

fn default_summary_model() -> String {
    DEFAULT_SUMMARY_MODEL.to_string()
}

fn default_summary_api_base() -> String {
    DEFAULT_SUMMARY_API_BASE.to_string()
}

/// Configuration for local embeddings and the vector index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Embedding model name (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embed_model")]
    pub model: String,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Vector upsert batch size for the backfill reconciler.
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,

    /// Default number of search results.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBED_MODEL.to_string(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            backfill_batch_size: DEFAULT_BACKFILL_BATCH_SIZE,
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_embed_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_backfill_batch_size() -> usize {
    DEFAULT_BACKFILL_BATCH_SIZE
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub fingerprint: FingerprintConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            fingerprint: FingerprintConfig::default(),
            enrichment: EnrichmentConfig::default(),
            semantic: SemanticConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Config {
    /// Load config from `$RETRACE_BASE_PATH/config.yaml`, falling back to
    /// `~/.config/retrace/`. Missing file yields defaults; the directory is
    /// created so stores can live next to the config.
    pub fn load() -> Config {
        let base_path = Self::resolve_base_path();

        if let Err(err) = std::fs::create_dir_all(&base_path) {
            panic!("cannot create data directory {base_path}: {err}");
        }

        let config_path = format!("{base_path}/config.yaml");
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(raw) => match serde_yml::from_str::<Config>(&raw) {
                Ok(config) => config,
                Err(err) => panic!("invalid config at {config_path}: {err}"),
            },
            Err(_) => Config::default(),
        };

        config.base_path = base_path;
        config.validate();
        config
    }

    pub fn save(&self) {
        let config_path = format!("{}/config.yaml", self.base_path);
        let raw = serde_yml::to_string(self).expect("config always serializes");
        if let Err(err) = std::fs::write(&config_path, raw) {
            log::error!("failed to write config to {config_path}: {err}");
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[cfg(test)]
    pub fn with_base_path(base_path: String) -> Config {
        let mut config = Config::default();
        config.base_path = base_path;
        config
    }

    fn resolve_base_path() -> String {
        if let Ok(path) = std::env::var("RETRACE_BASE_PATH") {
            if !path.is_empty() {
                return path;
            }
        }

        let home = homedir::my_home()
            .ok()
            .flatten()
            .expect("cannot determine home directory");
        format!("{}/.config/retrace", home.to_string_lossy())
    }

    fn validate(&mut self) {
        let fp = &self.fingerprint;
        if fp.shingle_size == 0 {
            panic!("fingerprint.shingle_size must be at least 1");
        }
        if fp.max_features == 0 {
            panic!("fingerprint.max_features must be at least 1");
        }
        if fp.near_duplicate_threshold > 32 {
            panic!(
                "fingerprint.near_duplicate_threshold must be between 0 and 32, got {}",
                fp.near_duplicate_threshold
            );
        }

        let enrich = &self.enrichment;
        if enrich.fallback_preview_chars > enrich.summary_max_input_chars {
            panic!("enrichment.fallback_preview_chars cannot exceed summary_max_input_chars");
        }

        if self.semantic.backfill_batch_size == 0 {
            panic!("semantic.backfill_batch_size must be at least 1");
        }
        if self.semantic.default_top_k == 0 {
            panic!("semantic.default_top_k must be at least 1");
        }
    }
}
