use crate::UrlError;
use url::Url;

/// Parses the start URL of a run
///
/// The URL must be absolute, use http or https, and carry a host. The
/// fragment is dropped so the start page keys the same way as any link that
/// points back to it.
pub fn parse_start_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !is_crawlable_scheme(&url) {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Resolves a discovered link against the page it was found on
///
/// Relative references are resolved, the fragment is stripped, and anything
/// that is not an http(s) URL with a host is rejected.
///
/// # Arguments
///
/// * `base` - URL of the page the link was found on
/// * `href` - Raw link target as it appeared in the page
///
/// # Returns
///
/// * `Some(Url)` - The absolute, fragment-free target
/// * `None` - The link cannot be crawled
///
/// # Examples
///
/// ```
/// use statetrail::url::normalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://a.test/docs/").unwrap();
/// let url = normalize_link(&base, "intro#setup").unwrap();
/// assert_eq!(url.as_str(), "https://a.test/docs/intro");
/// ```
pub fn normalize_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !is_crawlable_scheme(&url) || url.host_str().map_or(true, str::is_empty) {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}

/// True for http and https URLs
pub fn is_crawlable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
