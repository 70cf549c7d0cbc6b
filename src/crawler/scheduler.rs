//! Recursive per-site crawl under a shared concurrency bound
//!
//! This module handles:
//! - One task per discovered path, forked into a `JoinSet` and joined by its parent
//! - Global concurrency limiting via a semaphore shared by every site
//! - First-claim deduplication of paths through a per-site visited set
//! - Cooperative cancellation at task start and before recursion
//! - Counting in-flight tasks so a stop request can wait for them to drain

use crate::crawler::fetcher::PageFetcher;
use crate::index::PendingFinalization;
use crate::storage::{SiteRecord, SiteStatus, Storage};
use crate::url::{to_site_path, PathPolicy};
use dashmap::DashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Number of crawl tasks currently alive, with a wait for zero
#[derive(Debug, Default)]
pub struct ActiveTasks {
    count: AtomicUsize,
    idle: Notify,
}

/// Keeps one task counted in [`ActiveTasks`] until dropped
#[derive(Debug)]
pub struct ActiveGuard {
    tasks: Arc<ActiveTasks>,
}

impl ActiveTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(self: &Arc<Self>) -> ActiveGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            tasks: Arc::clone(self),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits until no task is counted
    ///
    /// Returns `false` if tasks were still running when `timeout` elapsed.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.tasks.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tasks.idle.notify_waiters();
        }
    }
}

/// State shared by every site crawl of one indexing run
pub struct CrawlContext {
    pub storage: Arc<dyn Storage>,
    pub fetcher: Arc<PageFetcher>,
    /// Admission gate bounding in-flight fetches across all sites
    pub permits: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub active: Arc<ActiveTasks>,
    pub policy: PathPolicy,
}

/// How a site crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteCrawlOutcome {
    Indexed,
    Cancelled,
    Failed,
}

/// A crawl of one site, rooted at its home path
pub struct SiteCrawl {
    ctx: Arc<CrawlContext>,
    site: SiteRecord,
    root: Url,
    visited: DashSet<String>,
    pending: PendingFinalization,
}

impl SiteCrawl {
    pub fn new(ctx: Arc<CrawlContext>, site: SiteRecord) -> crate::Result<Arc<Self>> {
        let root = Url::parse(&site.url)?;
        Ok(Arc::new(Self {
            ctx,
            site,
            root,
            visited: DashSet::new(),
            pending: PendingFinalization::new(),
        }))
    }

    pub fn site(&self) -> &SiteRecord {
        &self.site
    }

    /// Number of paths claimed so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Crawls the whole site, then finalizes deferred writes and marks it `Indexed`
    ///
    /// A cancelled crawl leaves the site in `Indexing`; the stop request
    /// moves it to `Failed`.
    pub async fn run(self: Arc<Self>) -> SiteCrawlOutcome {
        tracing::info!(site = %self.site.url, "Indexing site");

        let home = "/".to_string();
        self.visited.insert(home.clone());
        Arc::clone(&self).crawl_path(home).await;

        let report = self.ctx.fetcher.writer().finalize(&self.pending);

        if self.ctx.cancel.is_cancelled() {
            tracing::info!(site = %self.site.url, pages = self.visited_count(), "Site crawl cancelled");
            return SiteCrawlOutcome::Cancelled;
        }

        match self
            .ctx
            .storage
            .update_site_status(self.site.id, SiteStatus::Indexed, None)
        {
            Ok(()) => {
                tracing::info!(
                    site = %self.site.url,
                    pages = self.visited_count(),
                    lost = report.lost,
                    "Site indexed"
                );
                SiteCrawlOutcome::Indexed
            }
            Err(e) => {
                tracing::error!(site = %self.site.url, "Failed to mark site indexed: {}", e);
                SiteCrawlOutcome::Failed
            }
        }
    }

    /// Fetches one claimed path, then forks a task per newly claimed child
    /// and waits for all of them
    fn crawl_path(self: Arc<Self>, path: String) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            if self.ctx.cancel.is_cancelled() {
                return;
            }
            let _active = self.ctx.active.enter();

            let permit = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return,
                permit = Arc::clone(&self.ctx.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let fetched = self
                .ctx
                .fetcher
                .fetch_and_store(&self.site, &path, &self.pending)
                .await;
            drop(permit);

            let fetched = match fetched {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::error!(site = %self.site.url, path = %path, "Failed to store page: {}", e);
                    return;
                }
            };

            if self.ctx.cancel.is_cancelled() {
                return;
            }

            let mut children = JoinSet::new();
            for link in fetched.links() {
                let Some(child) = to_site_path(link, &self.root, &self.ctx.policy) else {
                    continue;
                };
                if self.visited.insert(child.clone()) {
                    children.spawn(Arc::clone(&self).crawl_path(child));
                }
            }

            while let Some(joined) = children.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(site = %self.site.url, "Crawl task panicked: {}", e);
                    }
                }
            }
        })
    }
}
