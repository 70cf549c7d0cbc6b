//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{LemmaRecord, NewPage, PageRecord, PostingRecord, SiteRecord, SiteStatus};
use rusqlite::ErrorCode;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Write contention: {0}")]
    Contention(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Whether retrying the same write may succeed
    ///
    /// Busy and locked databases are the SQLite forms of a lock conflict
    /// between concurrent writers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contention(_) => true,
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler, the
/// index writer and the search ranker. Implementations must be shareable
/// between tasks; every method takes `&self`.
pub trait Storage: Send + Sync {
    // ===== Site Management =====

    /// Deletes any site stored under `url` (with its pages, lemmas and
    /// postings) and inserts a fresh record in `Indexing` state
    fn reset_site(&self, url: &str, name: &str) -> StorageResult<SiteRecord>;

    /// Returns the site stored under `url`, creating it as `Indexed` if missing
    ///
    /// An existing site only has its status time refreshed.
    fn ensure_site(&self, url: &str, name: &str) -> StorageResult<SiteRecord>;

    /// Gets a site by ID
    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord>;

    /// Gets a site by its root URL
    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Lists every stored site, ordered by ID
    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Sets a site's status, status time and last error
    fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes a site's status time
    fn touch_site(&self, site_id: i64) -> StorageResult<()>;

    /// Moves every site still in `Indexing` state to `Failed` with the given
    /// error, returning how many were changed
    fn fail_indexing_sites(&self, last_error: &str) -> StorageResult<usize>;

    // ===== Page Management =====

    /// Gets the page stored for `(site_id, path)`
    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Inserts a page unless one already exists for its `(site_id, path)`
    ///
    /// # Returns
    ///
    /// The new page ID, or `None` if the page was already present
    fn insert_page(&self, page: &NewPage<'_>) -> StorageResult<Option<i64>>;

    /// Deletes a page and, through cascading keys, its postings
    ///
    /// Lemma frequencies are not touched; call `remove_page_postings` first.
    fn delete_page(&self, page_id: i64) -> StorageResult<()>;

    /// Gets pages by ID; missing IDs are skipped
    fn get_pages(&self, page_ids: &[i64]) -> StorageResult<Vec<PageRecord>>;

    /// Counts the pages stored for a site
    fn count_pages(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Lemma Management =====

    /// Inserts each lemma with frequency 1, or increments an existing one by 1
    ///
    /// Callers pass the distinct lemmas of one page. This is the first step
    /// of [`Storage::index_page`], exposed on its own for backends and
    /// maintenance code; the indexer itself only calls `index_page`.
    fn upsert_lemmas(&self, site_id: i64, lemmas: &[String]) -> StorageResult<()>;

    /// Gets the site's lemma rows for the given texts
    fn find_lemmas_by_text_and_site(
        &self,
        lemmas: &[String],
        site_id: i64,
    ) -> StorageResult<Vec<LemmaRecord>>;

    /// Counts the lemmas stored for a site
    fn count_lemmas(&self, site_id: i64) -> StorageResult<u64>;

    // ===== Posting Management =====

    /// Inserts postings for a page; an existing `(page, lemma)` posting has
    /// its rank overwritten
    ///
    /// The last step of [`Storage::index_page`], exposed on its own like
    /// [`Storage::upsert_lemmas`].
    fn upsert_postings(&self, page_id: i64, ranks: &[(i64, u32)]) -> StorageResult<()>;

    /// Gets every posting for the given lemma IDs
    fn find_postings_by_lemmas(&self, lemma_ids: &[i64]) -> StorageResult<Vec<PostingRecord>>;

    /// Gets every posting of a page
    fn find_postings_by_page(&self, page_id: i64) -> StorageResult<Vec<PostingRecord>>;

    /// Removes a page from the index
    ///
    /// Each referenced lemma loses one unit of frequency and is deleted at
    /// zero; the page's postings are then deleted.
    fn remove_page_postings(&self, page_id: i64) -> StorageResult<()>;

    /// Writes a page's lemma counts in one unit of work
    ///
    /// This composes [`Storage::upsert_lemmas`], a reload of the lemma IDs
    /// and [`Storage::upsert_postings`] in a single transaction, and is the
    /// only write the indexer issues.
    ///
    /// Only lemmas the page has no posting for yet raise their frequency, so
    /// writing the same counts twice leaves frequencies and ranks unchanged.
    /// Lemmas the page no longer contains are released.
    fn index_page(
        &self,
        site_id: i64,
        page_id: i64,
        lemmas: &BTreeMap<String, u32>,
    ) -> StorageResult<()>;
}
