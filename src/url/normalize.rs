use crate::url::domain::same_origin;
use url::Url;

/// Extensions of resources that are never crawled as pages
const RESOURCE_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tif", "tiff",
    // video
    "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "mpeg",
    // audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf", "txt", "csv", "xml",
    "json",
    // archives
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz",
    // executables
    "exe", "bin", "msi", "sh", "dmg", "apk", "jar",
    // scripts and styles
    "js", "css",
];

/// Rules applied to every discovered link before it is crawled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPolicy {
    pub max_length: usize,
    pub keep_query: bool,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            max_length: 255,
            keep_query: false,
        }
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
///
/// Repeated slashes collapse into one and an empty path becomes `/`.
///
/// # Examples
///
/// ```
/// use lemma_search::url::normalize_path;
///
/// assert_eq!(normalize_path("//a/./b/../c/"), "/a/c");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Path of `link` relative to the site rooted at `site_root`
///
/// Returns `None` when the link lives on another host or port, or outside
/// the site's base path. The query is kept; the fragment is dropped.
pub fn site_relative_path(link: &Url, site_root: &Url) -> Option<String> {
    if !same_origin(link, site_root) {
        return None;
    }

    let path = normalize_path(link.path());
    let base = normalize_path(site_root.path());

    let relative = if base == "/" {
        path
    } else if path == base {
        "/".to_string()
    } else {
        let rest = path.strip_prefix(&base)?;
        if !rest.starts_with('/') {
            return None;
        }
        rest.to_string()
    };

    match link.query() {
        Some(query) if !query.is_empty() => Some(format!("{}?{}", relative, query)),
        _ => Some(relative),
    }
}

/// Whether a path names a non-HTML resource by its extension
pub fn is_resource_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    let last = path.rsplit('/').next().unwrap_or(path);

    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            RESOURCE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Converts a discovered link into a crawlable site path
///
/// # Returns
///
/// * `Some(path)` - A path starting with `/`, ready to append to the site URL
/// * `None` - The link is off-site, a resource file, or too long
pub fn to_site_path(link: &Url, site_root: &Url, policy: &PathPolicy) -> Option<String> {
    if link.scheme() != "http" && link.scheme() != "https" {
        return None;
    }

    let mut path = site_relative_path(link, site_root)?;

    if !policy.keep_query {
        if let Some((bare, _)) = path.split_once('?') {
            path = bare.to_string();
        }
    }

    if is_resource_path(&path) || path.len() > policy.max_length {
        return None;
    }

    Some(path)
}
