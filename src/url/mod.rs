//! URL handling module for Lemma-Search
//!
//! This module turns discovered links into site paths, filters out
//! off-site links and resource files, and maps user-supplied page URLs to
//! the configured site that owns them.

mod domain;
mod matcher;
mod normalize;

pub use domain::{host_key, same_origin};
pub use matcher::{match_site, parse_page_url, SiteMatch};
pub use normalize::{is_resource_path, normalize_path, site_relative_path, to_site_path, PathPolicy};

use crate::config::IndexingConfig;

impl From<&IndexingConfig> for PathPolicy {
    fn from(config: &IndexingConfig) -> Self {
        Self {
            max_length: config.max_path_length,
            keep_query: config.keep_query_strings,
        }
    }
}
