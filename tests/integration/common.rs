//! Shared fixtures: mock sites, configuration and a wired service

use lemma_search::config::{parse_config, Config};
use lemma_search::storage::{SiteRecord, SqliteStorage, Storage};
use lemma_search::{IndexingGate, IndexingService, SiteStatus, TextAnalyzer};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

/// Serves `body` as HTML at `route`
pub async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Serves `body` as HTML at `route` and requires exactly one request for it
pub async fn mount_page_once(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Builds a validated configuration for the given `(url, name)` sites
pub fn test_config(sites: &[(&str, &str)]) -> Config {
    test_config_with_fetches(sites, 4)
}

/// Like [`test_config`] with a custom `max-concurrent-fetches`
pub fn test_config_with_fetches(sites: &[(&str, &str)], max_fetches: u32) -> Config {
    let mut toml = format!(
        r#"
[indexing]
max-concurrent-fetches = {}
fetch-timeout-ms = 10000
connect-timeout-ms = 2000
stop-grace-period-ms = 500
retry-backoff-ms = 1

[storage]
database-path = ":memory:"
"#,
        max_fetches
    );
    for (url, name) in sites {
        toml.push_str(&format!("\n[[sites]]\nurl = \"{}\"\nname = \"{}\"\n", url, name));
    }
    parse_config(&toml).expect("test config is valid")
}

pub struct Harness {
    pub config: Arc<Config>,
    pub storage: Arc<SqliteStorage>,
    pub analyzer: Arc<TextAnalyzer>,
    pub service: IndexingService,
}

pub fn harness(config: Config) -> Harness {
    harness_with_gate(config, Arc::new(IndexingGate::new()))
}

pub fn harness_with_gate(config: Config, gate: Arc<IndexingGate>) -> Harness {
    let config = Arc::new(config);
    let storage = Arc::new(SqliteStorage::open_in_memory().expect("in-memory database"));
    let analyzer = Arc::new(TextAnalyzer::new().expect("analyzer"));
    let service = IndexingService::new(
        Arc::clone(&config),
        storage.clone(),
        Arc::clone(&analyzer),
        gate,
    )
    .expect("service");

    Harness {
        config,
        storage,
        analyzer,
        service,
    }
}

impl Harness {
    pub fn site(&self, url: &str) -> SiteRecord {
        self.storage
            .find_site_by_url(url)
            .expect("site lookup")
            .expect("site is stored")
    }

    /// Polls until the site reaches `status`, panicking after five seconds
    pub async fn wait_for_status(&self, url: &str, status: SiteStatus) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(Some(site)) = self.storage.find_site_by_url(url) {
                if site.status == status {
                    return;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "site {} never reached {:?}",
                url,
                status
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
