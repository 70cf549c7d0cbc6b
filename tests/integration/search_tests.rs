//! Index-then-search scenarios against mock sites

use crate::common::{harness, mount_page, test_config, Harness};
use lemma_search::output::load_statistics;
use lemma_search::{SearchOutcome, SearchQuery, SearchRanker, SiteStatus};
use std::sync::Arc;
use wiremock::MockServer;

async fn indexed(sites: &[(&str, &str)]) -> Harness {
    let h = harness(test_config(sites));
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;
    h
}

fn ranker(h: &Harness) -> SearchRanker {
    SearchRanker::new(
        h.storage.clone(),
        Arc::clone(&h.analyzer),
        h.config.search.clone(),
    )
}

async fn mount_library(server: &MockServer) {
    mount_page(
        server,
        "/",
        r#"<html><head><title>Library</title></head><body>
            <a href="/systems">Systems</a>
            <a href="/networks">Networks</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/systems",
        r#"<html><head><title>Operating Systems</title></head>
            <body><p>The kernel schedules every process.</p></body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/networks",
        r#"<html><head><title>Networks</title></head>
            <body><p>A socket moves packets between hosts.</p></body></html>"#,
    )
    .await;
}

#[tokio::test]
async fn test_unique_term_finds_one_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_library(&server).await;

    let h = indexed(&[(&base, "Library")]).await;
    assert_eq!(h.site(&base).status, SiteStatus::Indexed);

    let outcome = ranker(&h).search(&SearchQuery::new("kernels")).unwrap();
    assert_eq!(outcome.total(), 1);

    let result = &outcome.results()[0];
    assert_eq!(result.path, "/systems");
    assert_eq!(result.title, "Operating Systems");
    assert_eq!(result.site_url, base);
    assert_eq!(result.site_name, "Library");
    assert_eq!(result.relevance, 1.0);
    assert!(result.snippet.contains("<b>kernel</b>"));
    assert!(result.snippet.ends_with("..."));
}

#[tokio::test]
async fn test_query_needs_every_term() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_library(&server).await;

    let h = indexed(&[(&base, "Library")]).await;
    let ranker = ranker(&h);

    assert_eq!(ranker.search(&SearchQuery::new("socket packets")).unwrap().total(), 1);
    assert_eq!(ranker.search(&SearchQuery::new("kernel socket")).unwrap().total(), 0);
    assert_eq!(
        ranker.search(&SearchQuery::new("the of")).unwrap(),
        SearchOutcome::NoSignificantTerms
    );
}

#[tokio::test]
async fn test_results_merge_across_sites() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_library(&first).await;
    mount_library(&second).await;
    let (a, b) = (first.uri(), second.uri());

    let h = indexed(&[(&a, "First"), (&b, "Second")]).await;
    let ranker = ranker(&h);

    let all = ranker.search(&SearchQuery::new("kernel")).unwrap();
    assert_eq!(all.total(), 2);
    assert!(all.results().iter().all(|result| result.relevance == 1.0));

    let filtered = ranker
        .search(&SearchQuery::new("kernel").site(b.as_str()))
        .unwrap();
    assert_eq!(filtered.total(), 1);
    assert_eq!(filtered.results()[0].site_name, "Second");

    let page = ranker
        .search(&SearchQuery::new("kernel").offset(1).limit(5))
        .unwrap();
    assert_eq!(page.total(), 2);
    assert_eq!(page.results().len(), 1);
}

#[tokio::test]
async fn test_statistics_after_indexing() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_library(&server).await;

    let h = indexed(&[(&base, "Library")]).await;
    let stats = load_statistics(
        h.storage.as_ref(),
        &h.config.sites,
        h.service.is_indexing(),
        &h.analyzer,
    )
    .unwrap();

    assert!(!stats.indexing);
    assert_eq!(stats.unresolved_words, 0);
    assert_eq!(stats.sites.len(), 1);
    assert_eq!(stats.sites[0].status, SiteStatus::Indexed);
    assert_eq!(stats.total_pages, 3);
    assert!(stats.total_lemmas > 0);
}
