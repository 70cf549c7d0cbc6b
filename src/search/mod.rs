//! Ranked search over the lemma index
//!
//! A query is reduced to lemmas, matched per site with AND semantics,
//! scored by summed posting ranks normalized to each site's best page,
//! then merged across sites and paginated.

mod ranker;
mod snippet;

pub use ranker::SearchRanker;
pub use snippet::build_snippet;

/// A search request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,

    /// Root URL of the only site to search; all stored sites when `None`
    pub site: Option<String>,

    pub offset: usize,

    /// Page size; the configured default when `None`
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One matching page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub site_url: String,
    pub site_name: String,
    pub path: String,
    pub title: String,
    pub snippet: String,

    /// Score relative to the best page of the same site, in `(0, 1]`
    pub relevance: f64,
}

/// Result of a search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query has no word that resolves to a lemma
    NoSignificantTerms,

    /// `total` counts every match; `results` holds the requested page of them
    Matches {
        total: usize,
        results: Vec<SearchResult>,
    },
}

impl SearchOutcome {
    pub fn total(&self) -> usize {
        match self {
            Self::NoSignificantTerms => 0,
            Self::Matches { total, .. } => *total,
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::NoSignificantTerms => &[],
            Self::Matches { results, .. } => results,
        }
    }
}
