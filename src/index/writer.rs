use crate::index::pending::{PendingEntry, PendingFinalization};
use crate::index::retry::{RetryOutcome, RetryPolicy};
use crate::storage::{Storage, StorageError, StorageResult};
use crate::text::TextAnalyzer;
use std::sync::Arc;

/// Result of indexing one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Lemmas and postings were written
    Indexed { lemmas: usize },
    /// The text held no indexable words
    Empty,
    /// Retries ran out; the write waits in the pending set
    Deferred,
}

/// Counts from replaying a pending set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub recovered: usize,
    pub lost: usize,
}

/// Writes page lemmas into the index store under the retry policy
pub struct IndexWriter {
    storage: Arc<dyn Storage>,
    analyzer: Arc<TextAnalyzer>,
    retry: RetryPolicy,
}

impl IndexWriter {
    pub fn new(storage: Arc<dyn Storage>, analyzer: Arc<TextAnalyzer>, retry: RetryPolicy) -> Self {
        Self {
            storage,
            analyzer,
            retry,
        }
    }

    pub fn analyzer(&self) -> &Arc<TextAnalyzer> {
        &self.analyzer
    }

    /// Tokenizes `text` and writes its lemmas for `page_id`
    ///
    /// Transient conflicts are retried; once retries run out the write is
    /// queued in `pending`. Other storage errors are returned.
    pub async fn index_page(
        &self,
        site_id: i64,
        page_id: i64,
        path: &str,
        text: &str,
        pending: &PendingFinalization,
    ) -> StorageResult<IndexOutcome> {
        let lemmas = self.analyzer.tokenize(text);
        if lemmas.is_empty() {
            return Ok(IndexOutcome::Empty);
        }

        let storage = &self.storage;
        let outcome = self
            .retry
            .run(
                || storage.index_page(site_id, page_id, &lemmas),
                StorageError::is_transient,
            )
            .await;

        match outcome {
            RetryOutcome::Done(()) => Ok(IndexOutcome::Indexed {
                lemmas: lemmas.len(),
            }),
            RetryOutcome::Exhausted(err) => {
                tracing::warn!(
                    page_id,
                    path,
                    "Deferring index write after {} attempts: {}",
                    self.retry.max_attempts,
                    err
                );
                pending.defer(
                    page_id,
                    PendingEntry {
                        site_id,
                        path: path.to_string(),
                        lemmas,
                    },
                );
                Ok(IndexOutcome::Deferred)
            }
            RetryOutcome::Failed(err) => Err(err),
        }
    }

    /// Replays every deferred write once, each in its own unit of work
    ///
    /// A page that still fails stays stored but unsearchable.
    pub fn finalize(&self, pending: &PendingFinalization) -> FinalizeReport {
        let mut report = FinalizeReport::default();

        for (page_id, entry) in pending.drain() {
            match self
                .storage
                .index_page(entry.site_id, page_id, &entry.lemmas)
            {
                Ok(()) => report.recovered += 1,
                Err(err) => {
                    tracing::error!(
                        page_id,
                        path = %entry.path,
                        "Index data lost, page will not be searchable: {}",
                        err
                    );
                    report.lost += 1;
                }
            }
        }

        if report.recovered + report.lost > 0 {
            tracing::info!(
                recovered = report.recovered,
                lost = report.lost,
                "Finalized deferred index writes"
            );
        }

        report
    }
}
