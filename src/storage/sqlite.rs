//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{LemmaRecord, NewPage, PageRecord, PostingRecord, SiteRecord, SiteStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Rows per multi-value statement, well under SQLite's bound-parameter limit
const SQL_CHUNK: usize = 300;

const SITE_COLUMNS: &str = "id, url, name, status, status_time, last_error";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content, title";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one storage value can be shared by
/// every crawl task; no lock is held across an await point.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))
    }
}

fn placeholders(group: &str, count: usize) -> String {
    vec![group; count].join(", ")
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    let status: String = row.get(3)?;
    let status_time: String = row.get(4)?;
    Ok(SiteRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        status: SiteStatus::from_db_string(&status).unwrap_or(SiteStatus::Failed),
        status_time: parse_time(4, &status_time)?,
        last_error: row.get(5)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        path: row.get(2)?,
        code: row.get(3)?,
        content: row.get(4)?,
        title: row.get(5)?,
    })
}

fn lemma_from_row(row: &Row<'_>) -> rusqlite::Result<LemmaRecord> {
    Ok(LemmaRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        lemma: row.get(2)?,
        frequency: row.get(3)?,
    })
}

fn posting_from_row(row: &Row<'_>) -> rusqlite::Result<PostingRecord> {
    Ok(PostingRecord {
        page_id: row.get(0)?,
        lemma_id: row.get(1)?,
        rank: row.get(2)?,
    })
}

fn select_site_by_url(conn: &Connection, url: &str) -> StorageResult<Option<SiteRecord>> {
    let site = conn
        .query_row(
            &format!("SELECT {} FROM sites WHERE url = ?1", SITE_COLUMNS),
            params![url],
            site_from_row,
        )
        .optional()?;
    Ok(site)
}

/// Inserts or increments lemma rows in sorted order, one statement per chunk
fn upsert_lemma_rows(conn: &Connection, site_id: i64, lemmas: &[&str]) -> StorageResult<()> {
    let mut sorted: Vec<&str> = lemmas.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    for chunk in sorted.chunks(SQL_CHUNK) {
        let sql = format!(
            "INSERT INTO lemmas (site_id, lemma, frequency) VALUES {}
             ON CONFLICT(site_id, lemma) DO UPDATE SET frequency = frequency + 1",
            placeholders("(?, ?, 1)", chunk.len())
        );
        let values: Vec<Value> = chunk
            .iter()
            .flat_map(|lemma| [Value::Integer(site_id), Value::Text(lemma.to_string())])
            .collect();
        conn.execute(&sql, params_from_iter(values.iter()))?;
    }
    Ok(())
}

fn select_lemmas(conn: &Connection, site_id: i64, lemmas: &[&str]) -> StorageResult<Vec<LemmaRecord>> {
    let mut found = Vec::with_capacity(lemmas.len());
    for chunk in lemmas.chunks(SQL_CHUNK) {
        let sql = format!(
            "SELECT id, site_id, lemma, frequency FROM lemmas WHERE site_id = ? AND lemma IN ({})",
            placeholders("?", chunk.len())
        );
        let values: Vec<Value> = std::iter::once(Value::Integer(site_id))
            .chain(chunk.iter().map(|lemma| Value::Text(lemma.to_string())))
            .collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), lemma_from_row)?;
        for row in rows {
            found.push(row?);
        }
    }
    Ok(found)
}

fn write_postings(conn: &Connection, page_id: i64, ranks: &[(i64, u32)]) -> StorageResult<()> {
    for chunk in ranks.chunks(SQL_CHUNK) {
        let sql = format!(
            "INSERT INTO postings (page_id, lemma_id, lemma_rank) VALUES {}
             ON CONFLICT(page_id, lemma_id) DO UPDATE SET lemma_rank = excluded.lemma_rank",
            placeholders("(?, ?, ?)", chunk.len())
        );
        let values: Vec<Value> = chunk
            .iter()
            .flat_map(|(lemma_id, rank)| {
                [
                    Value::Integer(page_id),
                    Value::Integer(*lemma_id),
                    Value::Integer(i64::from(*rank)),
                ]
            })
            .collect();
        conn.execute(&sql, params_from_iter(values.iter()))?;
    }
    Ok(())
}

/// Drops a page's postings for the given lemmas, decrementing each lemma
/// and deleting those that reach zero
fn release_lemmas(conn: &Connection, page_id: i64, lemma_ids: &[i64]) -> StorageResult<()> {
    for chunk in lemma_ids.chunks(SQL_CHUNK) {
        let list = placeholders("?", chunk.len());
        let ids: Vec<Value> = chunk.iter().map(|id| Value::Integer(*id)).collect();

        conn.execute(
            &format!(
                "UPDATE lemmas SET frequency = frequency - 1 WHERE id IN ({})",
                list
            ),
            params_from_iter(ids.iter()),
        )?;

        let scoped: Vec<Value> = std::iter::once(Value::Integer(page_id))
            .chain(ids.iter().cloned())
            .collect();
        conn.execute(
            &format!(
                "DELETE FROM postings WHERE page_id = ? AND lemma_id IN ({})",
                list
            ),
            params_from_iter(scoped.iter()),
        )?;

        conn.execute(
            &format!(
                "DELETE FROM lemmas WHERE frequency <= 0 AND id IN ({})",
                list
            ),
            params_from_iter(ids.iter()),
        )?;
    }
    Ok(())
}

impl Storage for SqliteStorage {
    // ===== Site Management =====

    fn reset_site(&self, url: &str, name: &str) -> StorageResult<SiteRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM sites WHERE url = ?1", params![url])?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO sites (url, name, status, status_time, last_error) VALUES (?1, ?2, ?3, ?4, NULL)",
            params![url, name, SiteStatus::Indexing.to_db_string(), now.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(SiteRecord {
            id,
            url: url.to_string(),
            name: name.to_string(),
            status: SiteStatus::Indexing,
            status_time: now,
            last_error: None,
        })
    }

    fn ensure_site(&self, url: &str, name: &str) -> StorageResult<SiteRecord> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO sites (url, name, status, status_time) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET status_time = excluded.status_time",
            params![url, name, SiteStatus::Indexed.to_db_string(), now],
        )?;

        select_site_by_url(&conn, url)?
            .ok_or_else(|| StorageError::Database(format!("site {} vanished after upsert", url)))
    }

    fn get_site(&self, site_id: i64) -> StorageResult<SiteRecord> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM sites WHERE id = ?1", SITE_COLUMNS),
            params![site_id],
            site_from_row,
        )
        .optional()?
        .ok_or(StorageError::SiteNotFound(site_id))
    }

    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>> {
        let conn = self.lock()?;
        select_site_by_url(&conn, url)
    }

    fn list_sites(&self) -> StorageResult<Vec<SiteRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM sites ORDER BY id", SITE_COLUMNS))?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sites SET status = ?1, status_time = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, last_error, site_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SiteNotFound(site_id));
        }
        Ok(())
    }

    fn touch_site(&self, site_id: i64) -> StorageResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE sites SET status_time = ?1 WHERE id = ?2",
            params![now, site_id],
        )?;
        Ok(())
    }

    fn fail_indexing_sites(&self, last_error: &str) -> StorageResult<usize> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE sites SET status = ?1, status_time = ?2, last_error = ?3 WHERE status = ?4",
            params![
                SiteStatus::Failed.to_db_string(),
                now,
                last_error,
                SiteStatus::Indexing.to_db_string()
            ],
        )?;
        Ok(changed)
    }

    // ===== Page Management =====

    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>> {
        let conn = self.lock()?;
        let page = conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE site_id = ?1 AND path = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, path],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn insert_page(&self, page: &NewPage<'_>) -> StorageResult<Option<i64>> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO pages (site_id, path, code, content, title) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(site_id, path) DO NOTHING",
            params![page.site_id, page.path, page.code, page.content, page.title],
        )?;

        if inserted == 0 {
            Ok(None)
        } else {
            Ok(Some(conn.last_insert_rowid()))
        }
    }

    fn delete_page(&self, page_id: i64) -> StorageResult<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM pages WHERE id = ?1", params![page_id])?;
        if deleted == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn get_pages(&self, page_ids: &[i64]) -> StorageResult<Vec<PageRecord>> {
        let conn = self.lock()?;
        let mut pages = Vec::with_capacity(page_ids.len());
        for chunk in page_ids.chunks(SQL_CHUNK) {
            let sql = format!(
                "SELECT {} FROM pages WHERE id IN ({})",
                PAGE_COLUMNS,
                placeholders("?", chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), page_from_row)?;
            for row in rows {
                pages.push(row?);
            }
        }
        Ok(pages)
    }

    fn count_pages(&self, site_id: i64) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Lemma Management =====

    fn upsert_lemmas(&self, site_id: i64, lemmas: &[String]) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let texts: Vec<&str> = lemmas.iter().map(String::as_str).collect();
        upsert_lemma_rows(&tx, site_id, &texts)?;
        tx.commit()?;
        Ok(())
    }

    fn find_lemmas_by_text_and_site(
        &self,
        lemmas: &[String],
        site_id: i64,
    ) -> StorageResult<Vec<LemmaRecord>> {
        let conn = self.lock()?;
        let texts: Vec<&str> = lemmas.iter().map(String::as_str).collect();
        select_lemmas(&conn, site_id, &texts)
    }

    fn count_lemmas(&self, site_id: i64) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM lemmas WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Posting Management =====

    fn upsert_postings(&self, page_id: i64, ranks: &[(i64, u32)]) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_postings(&tx, page_id, ranks)?;
        tx.commit()?;
        Ok(())
    }

    fn find_postings_by_lemmas(&self, lemma_ids: &[i64]) -> StorageResult<Vec<PostingRecord>> {
        let conn = self.lock()?;
        let mut postings = Vec::new();
        for chunk in lemma_ids.chunks(SQL_CHUNK) {
            let sql = format!(
                "SELECT page_id, lemma_id, lemma_rank FROM postings WHERE lemma_id IN ({})",
                placeholders("?", chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), posting_from_row)?;
            for row in rows {
                postings.push(row?);
            }
        }
        Ok(postings)
    }

    fn find_postings_by_page(&self, page_id: i64) -> StorageResult<Vec<PostingRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT page_id, lemma_id, lemma_rank FROM postings WHERE page_id = ?1 ORDER BY lemma_id",
        )?;
        let postings = stmt
            .query_map(params![page_id], posting_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(postings)
    }

    fn remove_page_postings(&self, page_id: i64) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let lemma_ids = {
            let mut stmt = tx.prepare("SELECT lemma_id FROM postings WHERE page_id = ?1")?;
            let ids = stmt
                .query_map(params![page_id], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        release_lemmas(&tx, page_id, &lemma_ids)?;

        tx.commit()?;
        Ok(())
    }

    fn index_page(
        &self,
        site_id: i64,
        page_id: i64,
        lemmas: &BTreeMap<String, u32>,
    ) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let posted: HashMap<String, i64> = {
            let mut stmt = tx.prepare(
                "SELECT l.lemma, l.id FROM postings p JOIN lemmas l ON l.id = p.lemma_id
                 WHERE p.page_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![page_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<HashMap<_, _>, _>>()?;
            rows
        };

        let fresh: Vec<&str> = lemmas
            .keys()
            .filter(|lemma| !posted.contains_key(*lemma))
            .map(String::as_str)
            .collect();
        let stale: Vec<i64> = posted
            .iter()
            .filter(|(lemma, _)| !lemmas.contains_key(*lemma))
            .map(|(_, id)| *id)
            .collect();

        upsert_lemma_rows(&tx, site_id, &fresh)?;
        release_lemmas(&tx, page_id, &stale)?;

        let texts: Vec<&str> = lemmas.keys().map(String::as_str).collect();
        let ranks: Vec<(i64, u32)> = select_lemmas(&tx, site_id, &texts)?
            .into_iter()
            .filter_map(|row| lemmas.get(&row.lemma).map(|rank| (row.id, *rank)))
            .collect();
        write_postings(&tx, page_id, &ranks)?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_site() -> (SqliteStorage, SiteRecord) {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let site = storage.reset_site("https://example.com", "Example").unwrap();
        (storage, site)
    }

    fn add_page(storage: &SqliteStorage, site_id: i64, path: &str) -> i64 {
        storage
            .insert_page(&NewPage {
                site_id,
                path,
                code: 200,
                content: "text",
                title: "Title",
            })
            .unwrap()
            .unwrap()
    }

    fn counts(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(l, c)| (l.to_string(), *c)).collect()
    }

    fn frequency(storage: &SqliteStorage, site_id: i64, lemma: &str) -> Option<u32> {
        storage
            .find_lemmas_by_text_and_site(&[lemma.to_string()], site_id)
            .unwrap()
            .first()
            .map(|l| l.frequency)
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_reset_site_creates_indexing_record() {
        let (storage, site) = storage_with_site();
        assert!(site.id > 0);

        let loaded = storage.get_site(site.id).unwrap();
        assert_eq!(loaded.status, SiteStatus::Indexing);
        assert_eq!(loaded.name, "Example");
        assert!(loaded.last_error.is_none());
    }

    #[test]
    fn test_reset_site_drops_previous_pages_and_lemmas() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");
        storage
            .index_page(site.id, page_id, &counts(&[("alpha", 2)]))
            .unwrap();

        let fresh = storage.reset_site("https://example.com", "Example").unwrap();

        assert_ne!(fresh.id, site.id);
        assert_eq!(storage.count_pages(fresh.id).unwrap(), 0);
        assert_eq!(storage.count_lemmas(fresh.id).unwrap(), 0);
        assert_eq!(storage.count_pages(site.id).unwrap(), 0);
        assert!(storage.find_postings_by_page(page_id).unwrap().is_empty());
    }

    #[test]
    fn test_insert_duplicate_page() {
        let (storage, site) = storage_with_site();
        add_page(&storage, site.id, "/about");

        let again = storage
            .insert_page(&NewPage {
                site_id: site.id,
                path: "/about",
                code: 404,
                content: "other",
                title: "",
            })
            .unwrap();

        assert!(again.is_none());
        let page = storage.find_page(site.id, "/about").unwrap().unwrap();
        assert_eq!(page.code, 200);
        assert_eq!(page.title, "Title");
    }

    #[test]
    fn test_upsert_lemmas_increments_once_per_call() {
        let (storage, site) = storage_with_site();
        let lemmas = vec!["beta".to_string(), "alpha".to_string()];

        storage.upsert_lemmas(site.id, &lemmas).unwrap();
        storage.upsert_lemmas(site.id, &lemmas[..1]).unwrap();

        assert_eq!(frequency(&storage, site.id, "alpha"), Some(1));
        assert_eq!(frequency(&storage, site.id, "beta"), Some(2));
    }

    #[test]
    fn test_upsert_postings_overwrites_rank() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");
        storage.upsert_lemmas(site.id, &["alpha".to_string()]).unwrap();
        let lemma = &storage
            .find_lemmas_by_text_and_site(&["alpha".to_string()], site.id)
            .unwrap()[0];

        storage.upsert_postings(page_id, &[(lemma.id, 3)]).unwrap();
        storage.upsert_postings(page_id, &[(lemma.id, 5)]).unwrap();

        let postings = storage.find_postings_by_page(page_id).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].rank, 5);
    }

    #[test]
    fn test_index_page_matches_separate_upserts() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let composed = storage.reset_site("https://a.com", "A").unwrap();
        let stepwise = storage.reset_site("https://b.com", "B").unwrap();
        let composed_page = add_page(&storage, composed.id, "/");
        let stepwise_page = add_page(&storage, stepwise.id, "/");
        let lemmas = counts(&[("alpha", 2), ("beta", 1)]);

        storage.index_page(composed.id, composed_page, &lemmas).unwrap();

        let texts: Vec<String> = lemmas.keys().cloned().collect();
        storage.upsert_lemmas(stepwise.id, &texts).unwrap();
        let ranks: Vec<(i64, u32)> = storage
            .find_lemmas_by_text_and_site(&texts, stepwise.id)
            .unwrap()
            .into_iter()
            .map(|row| (row.id, lemmas[&row.lemma]))
            .collect();
        storage.upsert_postings(stepwise_page, &ranks).unwrap();

        for text in &texts {
            assert_eq!(
                frequency(&storage, composed.id, text),
                frequency(&storage, stepwise.id, text)
            );
        }
        let ranks_of = |page_id| -> Vec<u32> {
            storage
                .find_postings_by_page(page_id)
                .unwrap()
                .into_iter()
                .map(|posting| posting.rank)
                .collect()
        };
        assert_eq!(ranks_of(composed_page), ranks_of(stepwise_page));
    }

    #[test]
    fn test_index_page_counts_document_frequency_once() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");

        storage
            .index_page(site.id, page_id, &counts(&[("alpha", 4)]))
            .unwrap();

        assert_eq!(frequency(&storage, site.id, "alpha"), Some(1));
        let postings = storage.find_postings_by_page(page_id).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].rank, 4);
    }

    #[test]
    fn test_index_page_twice_is_idempotent() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");
        let lemmas = counts(&[("alpha", 2), ("beta", 1)]);

        storage.index_page(site.id, page_id, &lemmas).unwrap();
        let first = storage.find_postings_by_page(page_id).unwrap();
        storage.index_page(site.id, page_id, &lemmas).unwrap();
        let second = storage.find_postings_by_page(page_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(frequency(&storage, site.id, "alpha"), Some(1));
        assert_eq!(frequency(&storage, site.id, "beta"), Some(1));
    }

    #[test]
    fn test_index_page_releases_dropped_lemmas() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");

        storage
            .index_page(site.id, page_id, &counts(&[("alpha", 1), ("beta", 1)]))
            .unwrap();
        storage
            .index_page(site.id, page_id, &counts(&[("alpha", 1)]))
            .unwrap();

        assert_eq!(frequency(&storage, site.id, "beta"), None);
        assert_eq!(storage.find_postings_by_page(page_id).unwrap().len(), 1);
    }

    #[test]
    fn test_frequency_spans_pages() {
        let (storage, site) = storage_with_site();
        let first = add_page(&storage, site.id, "/a");
        let second = add_page(&storage, site.id, "/b");

        storage
            .index_page(site.id, first, &counts(&[("alpha", 1)]))
            .unwrap();
        storage
            .index_page(site.id, second, &counts(&[("alpha", 7)]))
            .unwrap();

        assert_eq!(frequency(&storage, site.id, "alpha"), Some(2));
        let lemma = &storage
            .find_lemmas_by_text_and_site(&["alpha".to_string()], site.id)
            .unwrap()[0];
        let postings = storage.find_postings_by_lemmas(&[lemma.id]).unwrap();
        assert_eq!(postings.len(), 2);
    }

    #[test]
    fn test_remove_page_postings() {
        let (storage, site) = storage_with_site();
        let first = add_page(&storage, site.id, "/a");
        let second = add_page(&storage, site.id, "/b");
        storage
            .index_page(site.id, first, &counts(&[("alpha", 1), ("beta", 2)]))
            .unwrap();
        storage
            .index_page(site.id, second, &counts(&[("alpha", 1)]))
            .unwrap();

        storage.remove_page_postings(first).unwrap();

        assert!(storage.find_postings_by_page(first).unwrap().is_empty());
        assert_eq!(frequency(&storage, site.id, "alpha"), Some(1));
        assert_eq!(frequency(&storage, site.id, "beta"), None);
        assert_eq!(storage.find_postings_by_page(second).unwrap().len(), 1);
    }

    #[test]
    fn test_lemmas_are_per_site() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = storage.reset_site("https://a.test", "A").unwrap();
        let b = storage.reset_site("https://b.test", "B").unwrap();
        let page_a = add_page(&storage, a.id, "/");
        let page_b = add_page(&storage, b.id, "/");

        storage.index_page(a.id, page_a, &counts(&[("alpha", 1)])).unwrap();
        storage.index_page(b.id, page_b, &counts(&[("alpha", 1)])).unwrap();

        assert_eq!(frequency(&storage, a.id, "alpha"), Some(1));
        assert_eq!(frequency(&storage, b.id, "alpha"), Some(1));
    }

    #[test]
    fn test_ensure_site_keeps_existing_status() {
        let (storage, site) = storage_with_site();

        let ensured = storage.ensure_site("https://example.com", "Renamed").unwrap();
        assert_eq!(ensured.id, site.id);
        assert_eq!(ensured.status, SiteStatus::Indexing);
        assert_eq!(ensured.name, "Example");

        let created = storage.ensure_site("https://new.test", "New").unwrap();
        assert_eq!(created.status, SiteStatus::Indexed);
    }

    #[test]
    fn test_fail_indexing_sites() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let running = storage.reset_site("https://a.test", "A").unwrap();
        let done = storage.reset_site("https://b.test", "B").unwrap();
        storage
            .update_site_status(done.id, SiteStatus::Indexed, None)
            .unwrap();

        let changed = storage.fail_indexing_sites("stopped").unwrap();

        assert_eq!(changed, 1);
        let running = storage.get_site(running.id).unwrap();
        assert_eq!(running.status, SiteStatus::Failed);
        assert_eq!(running.last_error.as_deref(), Some("stopped"));
        assert_eq!(storage.get_site(done.id).unwrap().status, SiteStatus::Indexed);
    }

    #[test]
    fn test_get_pages_skips_missing() {
        let (storage, site) = storage_with_site();
        let page_id = add_page(&storage, site.id, "/");

        let pages = storage.get_pages(&[page_id, page_id + 100]).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "/");
    }

    #[test]
    fn test_missing_site_errors() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(matches!(
            storage.get_site(42),
            Err(StorageError::SiteNotFound(42))
        ));
        assert!(storage.find_site_by_url("https://none.test").unwrap().is_none());
    }
}
