//! Per-site AND matching and relevance scoring

use crate::config::SearchConfig;
use crate::search::snippet::build_snippet;
use crate::search::{SearchOutcome, SearchQuery, SearchResult};
use crate::storage::{LemmaRecord, SiteRecord, Storage};
use crate::text::TextAnalyzer;
use crate::SearchEngineError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One page that matched every surviving query lemma of its site
struct Hit {
    page_id: i64,
    site: usize,
    relevance: f64,
}

/// A searched site and the query lemmas that survived its frequency cutoff
struct SiteScope {
    record: SiteRecord,
    lemmas: Vec<String>,
}

/// Answers ranked queries against the stored index
pub struct SearchRanker {
    storage: Arc<dyn Storage>,
    analyzer: Arc<TextAnalyzer>,
    config: SearchConfig,
}

impl SearchRanker {
    pub fn new(storage: Arc<dyn Storage>, analyzer: Arc<TextAnalyzer>, config: SearchConfig) -> Self {
        Self {
            storage,
            analyzer,
            config,
        }
    }

    /// Runs a query
    ///
    /// # Errors
    ///
    /// `UnknownSite` if the site filter names no stored site; storage
    /// failures otherwise.
    pub fn search(&self, query: &SearchQuery) -> crate::Result<SearchOutcome> {
        let lemmas = self.analyzer.lemma_set(&query.query);
        if lemmas.is_empty() {
            tracing::debug!(query = %query.query, "Query has no significant terms");
            return Ok(SearchOutcome::NoSignificantTerms);
        }

        let sites = self.candidate_sites(query.site.as_deref())?;

        let mut scopes = Vec::with_capacity(sites.len());
        let mut hits = Vec::new();
        for record in sites {
            let (surviving, scores) = self.match_site(&record, &lemmas)?;
            if scores.is_empty() {
                continue;
            }
            let site = scopes.len();
            hits.extend(scores.into_iter().map(|(page_id, relevance)| Hit {
                page_id,
                site,
                relevance,
            }));
            scopes.push(SiteScope {
                record,
                lemmas: surviving,
            });
        }

        hits.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then(a.page_id.cmp(&b.page_id))
        });

        let total = hits.len();
        let limit = query.limit.unwrap_or(self.config.default_limit);
        let window: Vec<Hit> = hits.into_iter().skip(query.offset).take(limit).collect();

        tracing::debug!(
            query = %query.query,
            total,
            returned = window.len(),
            "Search finished"
        );

        let results = self.build_results(&window, &scopes)?;
        Ok(SearchOutcome::Matches { total, results })
    }

    fn candidate_sites(&self, filter: Option<&str>) -> crate::Result<Vec<SiteRecord>> {
        match filter {
            Some(url) => {
                let url = url.trim().trim_end_matches('/');
                match self.storage.find_site_by_url(url)? {
                    Some(site) => Ok(vec![site]),
                    None => Err(SearchEngineError::UnknownSite(url.to_string())),
                }
            }
            None => Ok(self.storage.list_sites()?),
        }
    }

    /// Scores the pages of one site that contain every surviving lemma
    ///
    /// Returns the surviving lemma texts and page id to relevance, where
    /// the best page scores 1.0.
    fn match_site(
        &self,
        site: &SiteRecord,
        lemmas: &[String],
    ) -> crate::Result<(Vec<String>, BTreeMap<i64, f64>)> {
        let found = self.storage.find_lemmas_by_text_and_site(lemmas, site.id)?;
        if found.len() < lemmas.len() {
            return Ok((Vec::new(), BTreeMap::new()));
        }

        let page_count = self.storage.count_pages(site.id)?;
        let cutoff = self.config.stop_word_fraction * page_count as f64;
        let mut surviving: Vec<LemmaRecord> = found
            .into_iter()
            .filter(|lemma| f64::from(lemma.frequency) <= cutoff)
            .collect();
        if surviving.is_empty() {
            tracing::debug!(site = %site.url, "Every query lemma is above the frequency cutoff");
            return Ok((Vec::new(), BTreeMap::new()));
        }
        surviving.sort_by(|a, b| a.frequency.cmp(&b.frequency).then(a.id.cmp(&b.id)));

        let ids: Vec<i64> = surviving.iter().map(|lemma| lemma.id).collect();
        let mut by_lemma: HashMap<i64, HashMap<i64, u32>> = HashMap::new();
        for posting in self.storage.find_postings_by_lemmas(&ids)? {
            by_lemma
                .entry(posting.lemma_id)
                .or_default()
                .insert(posting.page_id, posting.rank);
        }

        let mut scores: BTreeMap<i64, u64> = BTreeMap::new();
        for (position, lemma) in surviving.iter().enumerate() {
            let Some(pages) = by_lemma.get(&lemma.id) else {
                return Ok((Vec::new(), BTreeMap::new()));
            };

            if position == 0 {
                scores.extend(pages.iter().map(|(&page, &rank)| (page, u64::from(rank))));
            } else {
                scores.retain(|page, _| pages.contains_key(page));
                for (page, score) in scores.iter_mut() {
                    if let Some(&rank) = pages.get(page) {
                        *score += u64::from(rank);
                    }
                }
            }

            if scores.is_empty() {
                return Ok((Vec::new(), BTreeMap::new()));
            }
        }

        let best = scores.values().copied().max().unwrap_or(0);
        if best == 0 {
            return Ok((Vec::new(), BTreeMap::new()));
        }

        let relevance = scores
            .into_iter()
            .map(|(page, score)| (page, score as f64 / best as f64))
            .collect();
        let texts = surviving.into_iter().map(|lemma| lemma.lemma).collect();
        Ok((texts, relevance))
    }

    fn build_results(&self, hits: &[Hit], scopes: &[SiteScope]) -> crate::Result<Vec<SearchResult>> {
        let ids: Vec<i64> = hits.iter().map(|hit| hit.page_id).collect();
        let pages: HashMap<i64, _> = self
            .storage
            .get_pages(&ids)?
            .into_iter()
            .map(|page| (page.id, page))
            .collect();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(page) = pages.get(&hit.page_id) else {
                continue;
            };
            let scope = &scopes[hit.site];
            results.push(SearchResult {
                site_url: scope.record.url.clone(),
                site_name: scope.record.name.clone(),
                path: page.path.clone(),
                title: page.title.clone(),
                snippet: build_snippet(
                    &self.analyzer,
                    &page.content,
                    &scope.lemmas,
                    self.config.snippet_context_words,
                ),
                relevance: hit.relevance,
            });
        }
        Ok(results)
    }
}
