//! Statistics over the stored index
//!
//! This module provides per-site and total counts for the configured
//! sites, along with the global indexing flag and the number of words the
//! analyzer could not resolve.

use crate::config::SiteEntry;
use crate::storage::{SiteStatus, Storage, StorageResult};
use crate::text::TextAnalyzer;
use chrono::{DateTime, Utc};

/// Error reported for configured sites with no stored record
pub const NOT_INDEXED_YET: &str = "Not indexed yet";

/// Counts and status for one configured site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStatistics {
    pub name: String,
    pub url: String,
    pub status: SiteStatus,

    /// Time of the last status change; `None` for sites never indexed
    pub status_time: Option<DateTime<Utc>>,

    pub error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

/// Index statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatistics {
    pub sites: Vec<SiteStatistics>,
    pub total_pages: u64,
    pub total_lemmas: u64,
    pub indexing: bool,

    /// Words seen by this process that had no root form
    pub unresolved_words: usize,
}

/// Loads statistics for the configured sites, in configuration order
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `sites` - Configured sites
/// * `indexing` - Whether an indexing run is in progress
/// * `analyzer` - The analyzer used by the run, for its unresolved words
pub fn load_statistics(
    storage: &dyn Storage,
    sites: &[SiteEntry],
    indexing: bool,
    analyzer: &TextAnalyzer,
) -> StorageResult<IndexStatistics> {
    let mut detailed = Vec::with_capacity(sites.len());

    for entry in sites {
        let stats = match storage.find_site_by_url(&entry.url)? {
            Some(site) => SiteStatistics {
                name: site.name,
                url: site.url,
                status: site.status,
                status_time: Some(site.status_time),
                error: site.last_error,
                pages: storage.count_pages(site.id)?,
                lemmas: storage.count_lemmas(site.id)?,
            },
            None => SiteStatistics {
                name: entry.name.clone(),
                url: entry.url.clone(),
                status: SiteStatus::Failed,
                status_time: None,
                error: Some(NOT_INDEXED_YET.to_string()),
                pages: 0,
                lemmas: 0,
            },
        };
        detailed.push(stats);
    }

    Ok(IndexStatistics {
        total_pages: detailed.iter().map(|site| site.pages).sum(),
        total_lemmas: detailed.iter().map(|site| site.lemmas).sum(),
        sites: detailed,
        indexing,
        unresolved_words: analyzer.unresolved_count(),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Sites: {}", stats.sites.len());
    println!("  Total pages: {}", stats.total_pages);
    println!("  Total lemmas: {}", stats.total_lemmas);
    println!("  Indexing in progress: {}", if stats.indexing { "yes" } else { "no" });
    println!("  Unresolved words: {}", stats.unresolved_words);
    println!();

    for site in &stats.sites {
        println!("{} ({})", site.name, site.url);
        println!("  Status: {}", site.status);
        if let Some(time) = site.status_time {
            println!("  Status time: {}", time.to_rfc3339());
        }
        if let Some(error) = &site.error {
            println!("  Last error: {}", error);
        }
        println!("  Pages: {}", site.pages);
        println!("  Lemmas: {}", site.lemmas);
        println!();
    }
}
