use crate::config::SiteEntry;
use crate::url::normalize::site_relative_path;
use crate::{UrlError, UrlResult};
use url::Url;

/// A configured site that owns a URL, with the URL's site path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMatch<'a> {
    pub site: &'a SiteEntry,
    pub path: String,
}

/// Parses a user-supplied page URL
///
/// Surrounding whitespace is ignored. Only HTTP(S) URLs with a host are accepted.
pub fn parse_page_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Finds the configured site a page URL belongs to
///
/// Hosts are compared without case and without a `www.` prefix; the page
/// must sit under the site's base path. When several sites match, the one
/// with the longest base path wins.
///
/// # Returns
///
/// * `Ok(Some(SiteMatch))` - The owning site and the page's path on it
/// * `Ok(None)` - No configured site owns the URL
/// * `Err(UrlError)` - The URL is malformed
pub fn match_site<'a>(raw: &str, sites: &'a [SiteEntry]) -> UrlResult<Option<SiteMatch<'a>>> {
    let url = parse_page_url(raw)?;

    let best = sites
        .iter()
        .filter_map(|site| {
            let root = Url::parse(&site.url).ok()?;
            let path = site_relative_path(&url, &root)?;
            Some((root.path().len(), SiteMatch { site, path }))
        })
        .max_by_key(|(base_len, _)| *base_len)
        .map(|(_, found)| found);

    Ok(best)
}
