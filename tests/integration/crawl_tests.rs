//! Crawl lifecycle tests: dedup, error pages, cancellation, reindexing

use crate::common::{
    harness, harness_with_gate, html, mount_page, mount_page_once, test_config,
    test_config_with_fetches,
};
use lemma_search::crawler::{OUTSIDE_SITES, STOPPED_MANUALLY};
use lemma_search::storage::Storage;
use lemma_search::{IndexingGate, SiteStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crawl_stores_every_linked_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/kernel">Systems</a>
            <a href="/network">Networking</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/kernel",
        "<html><head><title>Kernel</title></head><body>kernel scheduler kernel</body></html>",
    )
    .await;
    mount_page(
        &server,
        "/network",
        "<html><head><title>Network</title></head><body>socket buffers</body></html>",
    )
    .await;

    let h = harness(test_config(&[(&base, "Mock")]));
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;

    let site = h.site(&base);
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(site.last_error, None);
    assert_eq!(h.storage.count_pages(site.id).unwrap(), 3);

    let kernel = h.storage.find_page(site.id, "/kernel").unwrap().unwrap();
    assert_eq!(kernel.code, 200);
    assert_eq!(kernel.title, "Kernel");

    let lemmas = h
        .storage
        .find_lemmas_by_text_and_site(&["kernel".to_string()], site.id)
        .unwrap();
    assert_eq!(lemmas.len(), 1);
    assert_eq!(lemmas[0].frequency, 1);

    let postings = h.storage.find_postings_by_page(kernel.id).unwrap();
    let kernel_posting = postings
        .iter()
        .find(|posting| posting.lemma_id == lemmas[0].id)
        .unwrap();
    // Title text is indexed with the body.
    assert_eq!(kernel_posting.rank, 3);
    assert!(!h.service.is_indexing());
}

#[tokio::test]
async fn test_page_linked_from_many_pages_is_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page_once(
        &server,
        "/",
        r#"<a href="/a">A</a> <a href="/b">B</a> <a href="/shared">S</a>"#,
    )
    .await;
    mount_page_once(
        &server,
        "/a",
        r#"<a href="/shared">S</a> <a href="/b">B</a> <a href="/">Home</a>"#,
    )
    .await;
    mount_page_once(
        &server,
        "/b",
        r#"<a href="/shared">S</a> <a href="/a">A</a> <a href="/shared#top">S</a>"#,
    )
    .await;
    mount_page_once(&server, "/shared", r#"<a href="/a">A</a> shared page"#).await;

    let h = harness(test_config(&[(&base, "Mock")]));
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;

    let site = h.site(&base);
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(h.storage.count_pages(site.id).unwrap(), 4);

    server.verify().await;
}

#[tokio::test]
async fn test_fetches_never_exceed_configured_limit() {
    let server = MockServer::start().await;
    let base = server.uri();

    let children: Vec<String> = (0..6).map(|i| format!("/c{}", i)).collect();
    let home: String = children
        .iter()
        .map(|child| format!(r#"<a href="{}">child</a> "#, child))
        .collect();
    mount_page(&server, "/", &home).await;
    for child in &children {
        Mock::given(method("GET"))
            .and(path(child.as_str()))
            .respond_with(html("<body>leaf page</body>").set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let h = harness(test_config_with_fetches(&[(&base, "Mock")], 2));
    let started = Instant::now();
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;

    // Six slow pages through two permits take at least three delays.
    assert!(started.elapsed() >= Duration::from_millis(900));
    let site = h.site(&base);
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(h.storage.count_pages(site.id).unwrap(), 7);
    server.verify().await;
}

#[tokio::test]
async fn test_failing_home_page_still_completes() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(test_config(&[(&base, "Mock")]));
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;

    let site = h.site(&base);
    assert_eq!(site.status, SiteStatus::Indexed);

    let home = h.storage.find_page(site.id, "/").unwrap().unwrap();
    assert_eq!(home.code, 503);
    assert!(home.content.contains("503"));
    assert_eq!(h.storage.count_pages(site.id).unwrap(), 1);
    assert_eq!(h.storage.count_lemmas(site.id).unwrap(), 0);
}

#[tokio::test]
async fn test_stop_fails_unfinished_sites_only() {
    let fast = MockServer::start().await;
    let slow = MockServer::start().await;
    let fast_url = fast.uri();
    let slow_url = slow.uri();

    mount_page(&fast, "/", "<body>quick response</body>").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<body>late</body>", "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;

    let h = harness(test_config(&[(&fast_url, "Fast"), (&slow_url, "Slow")]));
    assert!(h.service.start_indexing());
    h.wait_for_status(&fast_url, SiteStatus::Indexed).await;

    assert!(h.service.stop_indexing().await);
    assert!(!h.service.is_indexing());

    let fast_site = h.site(&fast_url);
    assert_eq!(fast_site.status, SiteStatus::Indexed);
    assert_eq!(fast_site.last_error, None);

    let slow_site = h.site(&slow_url);
    assert_eq!(slow_site.status, SiteStatus::Failed);
    assert_eq!(slow_site.last_error.as_deref(), Some(STOPPED_MANUALLY));

    assert!(!h.service.stop_indexing().await);
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<body>slow</body>", "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let gate = Arc::new(IndexingGate::new());
    let h = harness_with_gate(test_config(&[(&base, "Mock")]), Arc::clone(&gate));
    let other = harness_with_gate(test_config(&[(&base, "Mock")]), Arc::clone(&gate));

    assert!(h.service.start_indexing());
    assert!(!h.service.start_indexing());
    assert!(!other.service.start_indexing());
    assert!(gate.is_running());

    assert!(h.service.stop_indexing().await);
    assert!(!gate.is_running());
}

fn index_snapshot(h: &crate::common::Harness, site_id: i64, path: &str) -> BTreeMap<String, (u32, u32)> {
    let page = h.storage.find_page(site_id, path).unwrap().unwrap();
    let texts = h.analyzer.lemma_set(&page.content);
    let lemmas = h
        .storage
        .find_lemmas_by_text_and_site(&texts, site_id)
        .unwrap();
    let ranks: BTreeMap<i64, u32> = h
        .storage
        .find_postings_by_page(page.id)
        .unwrap()
        .into_iter()
        .map(|posting| (posting.lemma_id, posting.rank))
        .collect();

    lemmas
        .into_iter()
        .map(|lemma| {
            let rank = ranks.get(&lemma.id).copied().unwrap_or(0);
            (lemma.lemma, (lemma.frequency, rank))
        })
        .collect()
}

#[tokio::test]
async fn test_reindex_same_content_is_idempotent() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/doc">Doc</a> kernel"#).await;
    mount_page(&server, "/doc", "<body>kernel kernel socket thread</body>").await;

    let h = harness(test_config(&[(&base, "Mock")]));
    assert!(h.service.start_indexing());
    h.service.wait_for_completion().await;

    let site = h.site(&base);
    let before = index_snapshot(&h, site.id, "/doc");
    assert_eq!(before.get("kernel"), Some(&(2, 2)));

    for _ in 0..2 {
        let update = h
            .service
            .index_or_reindex_page(&format!("{}/doc", base))
            .await;
        assert!(update.ok, "{:?}", update.error);
        assert_eq!(index_snapshot(&h, site.id, "/doc"), before);
    }
    assert_eq!(h.storage.count_pages(site.id).unwrap(), 2);
}

#[tokio::test]
async fn test_page_update_creates_missing_site() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/solo", "<title>Solo</title><body>kernel</body>").await;

    let h = harness(test_config(&[(&base, "Mock")]));
    assert!(h.storage.find_site_by_url(&base).unwrap().is_none());

    let update = h
        .service
        .index_or_reindex_page(&format!("{}/solo", base))
        .await;
    assert!(update.ok);

    let site = h.site(&base);
    assert_eq!(site.status, SiteStatus::Indexed);
    assert_eq!(site.name, "Mock");
    let page = h.storage.find_page(site.id, "/solo").unwrap().unwrap();
    assert_eq!(page.title, "Solo");

    let outside = h
        .service
        .index_or_reindex_page("https://unrelated.example/solo")
        .await;
    assert!(!outside.ok);
    assert_eq!(outside.error.as_deref(), Some(OUTSIDE_SITES));
}
