//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests that follow redirects
//! - Error classification into stored page records
//! - Handing successful pages to the index writer

use crate::config::IndexingConfig;
use crate::crawler::parser::parse_html;
use crate::index::{IndexWriter, PendingFinalization};
use crate::storage::{NewPage, SiteRecord, Storage};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, REFERER};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use url::Url;

/// Status code stored for transport failures and unusable responses
pub const TRANSPORT_ERROR_STATUS: u16 = 500;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Canonical reason phrase, if any
        reason: String,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Status code to store for this result
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { status_code, .. } | Self::HttpError { status_code, .. } => *status_code,
            Self::ContentMismatch { .. } | Self::NetworkError { .. } => TRANSPORT_ERROR_STATUS,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```
/// use lemma_search::config::IndexingConfig;
/// use lemma_search::crawler::build_http_client;
///
/// let client = build_http_client(&IndexingConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &IndexingConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Some(referrer) = &config.referrer {
        match HeaderValue::from_str(referrer) {
            Ok(value) => {
                headers.insert(REFERER, value);
            }
            Err(e) => tracing::warn!("Ignoring unusable referrer {}: {}", referrer, e),
        }
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(config.fetch_timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, following redirects, and classifies the response
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            return FetchResult::NetworkError { error };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        };
    }

    // A missing Content-Type is treated as HTML
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
        return FetchResult::ContentMismatch { content_type };
    }

    let final_url = response.url().clone();
    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
        },
    }
}

/// What `fetch_and_store` did for one path
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedPage {
    /// A page for this path was already stored; nothing was fetched
    AlreadyStored,
    /// The path was fetched and stored
    Stored {
        page_id: i64,
        status_code: u16,
        /// Links found on a successful page, for the scheduler to filter
        links: Vec<Url>,
    },
}

impl FetchedPage {
    pub fn created(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    pub fn links(&self) -> &[Url] {
        match self {
            Self::Stored { links, .. } => links,
            Self::AlreadyStored => &[],
        }
    }
}

/// Fetches site paths into page records and indexes the successful ones
pub struct PageFetcher {
    client: Client,
    storage: Arc<dyn Storage>,
    writer: Arc<IndexWriter>,
}

impl PageFetcher {
    pub fn new(client: Client, storage: Arc<dyn Storage>, writer: Arc<IndexWriter>) -> Self {
        Self {
            client,
            storage,
            writer,
        }
    }

    pub fn writer(&self) -> &Arc<IndexWriter> {
        &self.writer
    }

    /// Fetches `site.url + path` once and stores the outcome as a page
    ///
    /// Failed fetches are stored too, with the error as content, so a broken
    /// link is not requested again during the same crawl. Only pages stored
    /// with status 200 are indexed.
    pub async fn fetch_and_store(
        &self,
        site: &SiteRecord,
        path: &str,
        pending: &PendingFinalization,
    ) -> crate::Result<FetchedPage> {
        if self.storage.find_page(site.id, path)?.is_some() {
            tracing::debug!(site = %site.url, path, "Page already stored, skipping fetch");
            return Ok(FetchedPage::AlreadyStored);
        }

        let url = format!("{}{}", site.url, path);
        let result = fetch_url(&self.client, &url).await;
        let status_code = result.status_code();

        let (title, content, links) = match result {
            FetchResult::Success {
                final_url, body, ..
            } => {
                let parsed = parse_html(&body, &final_url);
                (parsed.title, parsed.text, parsed.links)
            }
            FetchResult::HttpError {
                status_code,
                reason,
            } => {
                tracing::warn!(url = %url, status_code, "HTTP error");
                let message = format!("HTTP {} {}", status_code, reason);
                (String::new(), message.trim_end().to_string(), Vec::new())
            }
            FetchResult::ContentMismatch { content_type } => {
                tracing::debug!(url = %url, content_type = %content_type, "Not an HTML page");
                let message = format!("Unsupported content type: {}", content_type);
                (String::new(), message, Vec::new())
            }
            FetchResult::NetworkError { error } => {
                tracing::warn!(url = %url, "Fetch failed: {}", error);
                (String::new(), error, Vec::new())
            }
        };

        let inserted = self.storage.insert_page(&NewPage {
            site_id: site.id,
            path,
            code: status_code,
            content: &content,
            title: &title,
        })?;
        let Some(page_id) = inserted else {
            tracing::debug!(site = %site.url, path, "Page stored concurrently, skipping");
            return Ok(FetchedPage::AlreadyStored);
        };
        self.storage.touch_site(site.id)?;

        if status_code == 200 {
            if let Err(e) = self
                .writer
                .index_page(site.id, page_id, path, &content, pending)
                .await
            {
                tracing::error!(page_id, path, "Index write failed: {}", e);
            }
        }

        tracing::debug!(site = %site.url, path, status_code, links = links.len(), "Stored page");
        Ok(FetchedPage::Stored {
            page_id,
            status_code,
            links,
        })
    }

    /// Drops a stored page from the index and fetches it again
    ///
    /// A write deferred during the fetch is finalized before returning.
    pub async fn reindex_page(&self, site: &SiteRecord, path: &str) -> crate::Result<FetchedPage> {
        if let Some(page) = self.storage.find_page(site.id, path)? {
            self.storage.remove_page_postings(page.id)?;
            self.storage.delete_page(page.id)?;
        }

        let pending = PendingFinalization::new();
        let fetched = self.fetch_and_store(site, path, &pending).await?;
        self.writer.finalize(&pending);
        Ok(fetched)
    }
}
