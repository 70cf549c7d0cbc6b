//! Crawler module for fetching, storing and indexing site pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and storage of every visited page
//! - HTML parsing and link extraction
//! - Recursive per-site crawls under a global fetch bound
//! - Run lifecycle: start, stop and single-page updates

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{IndexingGate, IndexingService, PageUpdate, OUTSIDE_SITES, STOPPED_MANUALLY};
pub use fetcher::{build_http_client, fetch_url, FetchResult, FetchedPage, PageFetcher};
pub use parser::{parse_html, ParsedPage};
pub use scheduler::{ActiveGuard, ActiveTasks, CrawlContext, SiteCrawl, SiteCrawlOutcome};
