//! Lemma-Search: a per-site lemma index and ranked search engine
//!
//! This crate crawls a configured list of web sites, reduces their text to
//! language-aware root forms, keeps a per-site inverted index of those lemmas
//! and answers ranked free-text queries against it.

pub mod config;
pub mod crawler;
pub mod index;
pub mod output;
pub mod search;
pub mod storage;
pub mod text;
pub mod url;

use thiserror::Error;

/// Main error type for Lemma-Search operations
#[derive(Debug, Error)]
pub enum SearchEngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Site is not indexed: {0}")]
    UnknownSite(String),

    #[error("{}", crawler::OUTSIDE_SITES)]
    OutsideConfiguredSites(String),

    #[error("Indexing is already in progress")]
    IndexingInProgress,

    #[error("Invalid text pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Lemma-Search operations
pub type Result<T> = std::result::Result<T, SearchEngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{IndexingGate, IndexingService, PageUpdate};
pub use search::{SearchOutcome, SearchQuery, SearchRanker, SearchResult};
pub use storage::{SiteStatus, SqliteStorage, Storage};
pub use text::TextAnalyzer;
