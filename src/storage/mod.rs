//! Storage module for the lemma index
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Site and page records
//! - Lemma document frequencies and page postings
//! - Idempotent batched upserts used by the index writer

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens (creating if needed) a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents an indexed site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Represents a fetched page
///
/// `content` is the extracted plain text, or the error message when the
/// fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: u16,
    pub content: String,
    pub title: String,
}

/// A page about to be inserted
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub site_id: i64,
    pub path: &'a str,
    pub code: u16,
    pub content: &'a str,
    pub title: &'a str,
}

/// A lemma and the number of pages on its site that contain it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LemmaRecord {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: u32,
}

/// A page x lemma index entry; `rank` is the in-page occurrence count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingRecord {
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: u32,
}

/// Indexing status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl SiteStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Indexing => "INDEXING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "INDEXING" => Some(Self::Indexing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
