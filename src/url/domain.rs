use url::Url;

/// Extracts the comparable host of a URL
///
/// The host is lowercased and a leading `www.` is removed.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lemma_search::url::host_key;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match host.strip_prefix("www.") {
        Some(bare) => Some(bare.to_string()),
        None => Some(host),
    }
}

/// Whether two URLs share host and explicit port
///
/// The scheme is not compared.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    match (host_key(a), host_key(b)) {
        (Some(left), Some(right)) => left == right && a.port() == b.port(),
        _ => false,
    }
}
