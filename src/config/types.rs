use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Lemma-Search
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexing: IndexingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

/// Crawl and index-build behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexingConfig {
    /// Upper bound on in-flight fetch tasks across the whole crawl
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Overall request timeout (milliseconds)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// TCP connect timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long a stop request waits for in-flight tasks (milliseconds)
    #[serde(default = "default_stop_grace_period_ms")]
    pub stop_grace_period_ms: u64,

    /// Attempts made for a page's index write before it is deferred
    #[serde(default = "default_contention_retries")]
    pub contention_retries: u32,

    /// Pause between index write attempts (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub referrer: Option<String>,

    /// Discovered paths longer than this are not crawled
    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,

    /// Whether `?query` parts stay in crawled paths
    #[serde(default = "default_keep_query_strings")]
    pub keep_query_strings: bool,
}

impl IndexingConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_millis(self.stop_grace_period_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            stop_grace_period_ms: default_stop_grace_period_ms(),
            contention_retries: default_contention_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            referrer: None,
            max_path_length: default_max_path_length(),
            keep_query_strings: default_keep_query_strings(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

/// Search and ranking parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Lemmas present on more than this share of a site's pages are ignored
    #[serde(default = "default_stop_word_fraction")]
    pub stop_word_fraction: f64,

    /// Words shown on each side of the highlighted word
    #[serde(default = "default_snippet_context_words")]
    pub snippet_context_words: usize,

    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            stop_word_fraction: default_stop_word_fraction(),
            snippet_context_words: default_snippet_context_words(),
            default_limit: default_limit(),
        }
    }
}

/// A site to crawl and index
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteEntry {
    /// Site root, e.g. "https://example.com"
    pub url: String,

    /// Human-readable name
    pub name: String,
}

fn default_max_concurrent_fetches() -> u32 {
    16
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_stop_grace_period_ms() -> u64 {
    30_000
}

fn default_contention_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_user_agent() -> String {
    concat!("LemmaSearchBot/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_path_length() -> usize {
    255
}

fn default_keep_query_strings() -> bool {
    false
}

fn default_stop_word_fraction() -> f64 {
    0.85
}

fn default_snippet_context_words() -> usize {
    20
}

fn default_limit() -> usize {
    20
}
