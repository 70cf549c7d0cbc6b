//! Indexing coordinator - run lifecycle for the whole site list
//!
//! This module owns the operations the outer layer calls:
//! - Starting a run over every configured site, guarded by [`IndexingGate`]
//! - Stopping a run with a bounded grace period
//! - Indexing or re-indexing a single page on request

use crate::config::{Config, SiteEntry};
use crate::crawler::fetcher::{build_http_client, PageFetcher};
use crate::crawler::scheduler::{ActiveTasks, CrawlContext, SiteCrawl, SiteCrawlOutcome};
use crate::index::{IndexWriter, RetryPolicy};
use crate::storage::{SiteStatus, Storage};
use crate::text::TextAnalyzer;
use crate::url::{match_site, PathPolicy};
use crate::SearchEngineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Error stored on sites that were still indexing when a stop was requested
pub const STOPPED_MANUALLY: &str = "Indexing was stopped manually";

/// Error returned for page URLs no configured site owns
pub const OUTSIDE_SITES: &str =
    "This page is outside the sites listed in the configuration file";

/// Process-wide "indexing in progress" flag
///
/// At most one run holds the gate; a second start is rejected.
#[derive(Debug, Default)]
pub struct IndexingGate {
    running: AtomicBool,
}

impl IndexingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate; returns `false` if a run already holds it
    pub fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Outcome of a single-page index request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    pub ok: bool,
    pub error: Option<String>,
}

impl PageUpdate {
    fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

struct RunHandle {
    cancel: CancellationToken,
    /// Cancelled once the run has fully ended
    done: CancellationToken,
    active: Arc<ActiveTasks>,
    task: JoinHandle<()>,
}

/// Runs crawls over the configured sites and single-page updates
pub struct IndexingService {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    fetcher: Arc<PageFetcher>,
    gate: Arc<IndexingGate>,
    run: Mutex<Option<RunHandle>>,
}

impl IndexingService {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<dyn Storage>,
        analyzer: Arc<TextAnalyzer>,
        gate: Arc<IndexingGate>,
    ) -> crate::Result<Self> {
        let client = build_http_client(&config.indexing)?;
        let writer = IndexWriter::new(
            Arc::clone(&storage),
            analyzer,
            RetryPolicy::from_config(&config.indexing),
        );
        let fetcher = PageFetcher::new(client, Arc::clone(&storage), Arc::new(writer));

        Ok(Self {
            config,
            storage,
            fetcher: Arc::new(fetcher),
            gate,
            run: Mutex::new(None),
        })
    }

    pub fn gate(&self) -> &Arc<IndexingGate> {
        &self.gate
    }

    pub fn is_indexing(&self) -> bool {
        self.gate.is_running()
    }

    fn run_slot(&self) -> MutexGuard<'_, Option<RunHandle>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts indexing every configured site in the background
    ///
    /// Each site's previous pages and lemmas are dropped first. Returns
    /// `false` without side effects if a run is already in progress.
    pub fn start_indexing(&self) -> bool {
        if !self.gate.try_start() {
            tracing::warn!("Indexing already in progress, start rejected");
            return false;
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let active = Arc::new(ActiveTasks::new());
        let ctx = Arc::new(CrawlContext {
            storage: Arc::clone(&self.storage),
            fetcher: Arc::clone(&self.fetcher),
            permits: Arc::new(Semaphore::new(
                self.config.indexing.max_concurrent_fetches as usize,
            )),
            cancel: cancel.clone(),
            active: Arc::clone(&active),
            policy: PathPolicy::from(&self.config.indexing),
        });

        let sites = self.config.sites.clone();
        let gate = Arc::clone(&self.gate);
        let finished = done.clone();
        let task = tokio::spawn(async move {
            index_sites(ctx, sites).await;
            gate.finish();
            finished.cancel();
        });

        *self.run_slot() = Some(RunHandle {
            cancel,
            done,
            active,
            task,
        });
        true
    }

    /// Waits until the current run, if any, has ended
    pub async fn wait_for_completion(&self) {
        let done = self.run_slot().as_ref().map(|run| run.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// Stops the current run
    ///
    /// In-flight fetches may finish but schedule nothing further. After
    /// they drain, or after the configured grace period, every site still
    /// `Indexing` is marked `Failed`. Returns `false` if nothing was running.
    pub async fn stop_indexing(&self) -> bool {
        if !self.gate.is_running() {
            return false;
        }
        let Some(mut run) = self.run_slot().take() else {
            return false;
        };

        tracing::info!("Stop requested, cancelling crawl tasks");
        run.cancel.cancel();

        let grace = self.config.indexing.stop_grace_period();
        let deadline = tokio::time::Instant::now() + grace;
        if !run.active.wait_idle(grace).await {
            tracing::warn!(
                remaining = run.active.count(),
                "Crawl tasks still running after grace period"
            );
        }
        if tokio::time::timeout_at(deadline, &mut run.task).await.is_err() {
            run.task.abort();
        }

        match self.storage.fail_indexing_sites(STOPPED_MANUALLY) {
            Ok(count) => tracing::info!(sites = count, "Marked unfinished sites as failed"),
            Err(e) => tracing::error!("Failed to mark stopped sites: {}", e),
        }

        self.gate.finish();
        run.done.cancel();
        true
    }

    /// Fetches one page again and replaces its index entries
    ///
    /// The URL must belong to a configured site; the site record is created
    /// if it does not exist yet.
    pub async fn index_or_reindex_page(&self, url: &str) -> PageUpdate {
        let matched = match match_site(url, &self.config.sites) {
            Ok(Some(matched)) => matched,
            Ok(None) => {
                let err = SearchEngineError::OutsideConfiguredSites(url.to_string());
                tracing::warn!(url, "Page update rejected: {}", err);
                return PageUpdate::rejected(err.to_string());
            }
            Err(e) => {
                tracing::warn!(url, "Page update rejected: {}", e);
                return PageUpdate::rejected(e.to_string());
            }
        };

        let site = match self
            .storage
            .ensure_site(&matched.site.url, &matched.site.name)
        {
            Ok(site) => site,
            Err(e) => return PageUpdate::rejected(e.to_string()),
        };

        match self.fetcher.reindex_page(&site, &matched.path).await {
            Ok(_) => {
                tracing::info!(site = %site.url, path = %matched.path, "Page re-indexed");
                PageUpdate::accepted()
            }
            Err(e) => {
                tracing::error!(site = %site.url, path = %matched.path, "Page update failed: {}", e);
                PageUpdate::rejected(e.to_string())
            }
        }
    }
}

/// Resets every site, then crawls them all concurrently
async fn index_sites(ctx: Arc<CrawlContext>, sites: Vec<SiteEntry>) {
    let mut records = Vec::with_capacity(sites.len());
    for entry in &sites {
        match ctx.storage.reset_site(&entry.url, &entry.name) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::error!(site = %entry.url, "Failed to reset site: {}", e);
                mark_failed(ctx.storage.as_ref(), entry, &e.to_string());
            }
        }
    }

    let mut crawls = JoinSet::new();
    for record in records {
        match SiteCrawl::new(Arc::clone(&ctx), record.clone()) {
            Ok(crawl) => {
                crawls.spawn(crawl.run());
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(site = %record.url, "Cannot crawl site: {}", message);
                if let Err(e) =
                    ctx.storage
                        .update_site_status(record.id, SiteStatus::Failed, Some(&message))
                {
                    tracing::error!(site = %record.url, "Failed to mark site failed: {}", e);
                }
            }
        }
    }

    let mut indexed = 0;
    while let Some(joined) = crawls.join_next().await {
        match joined {
            Ok(SiteCrawlOutcome::Indexed) => indexed += 1,
            Ok(_) => {}
            Err(e) => tracing::error!("Site crawl task failed: {}", e),
        }
    }

    tracing::info!(sites = sites.len(), indexed, "Indexing run finished");
}

/// Marks an already stored site `Failed` when its run could not begin
fn mark_failed(storage: &dyn Storage, entry: &SiteEntry, message: &str) {
    let site = match storage.find_site_by_url(&entry.url) {
        Ok(Some(site)) => site,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(site = %entry.url, "Failed to look up site: {}", e);
            return;
        }
    };
    if let Err(e) = storage.update_site_status(site.id, SiteStatus::Failed, Some(message)) {
        tracing::error!(site = %entry.url, "Failed to mark site failed: {}", e);
    }
}
