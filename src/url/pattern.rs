use url::Url;

/// Placeholder substituted for purely numeric query values
const ID_PLACEHOLDER: &str = "{id}";

/// Builds the display pattern of a URL
///
/// The pattern groups pages rendered from the same template: the scheme's
/// default port is dropped and every query value made only of ASCII digits
/// becomes `{id}`. It is never used for identity. Input that does not parse as an
/// absolute URL with a host is returned unchanged.
///
/// # Examples
///
/// ```
/// use statetrail::url::url_pattern;
///
/// assert_eq!(
///     url_pattern("https://a.test:443/item?id=42&tab=info"),
///     "https://a.test/item?id={id}&tab=info"
/// );
/// ```
pub fn url_pattern(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(host) = url.host_str() else {
        return raw.to_string();
    };

    let mut pattern = format!("{}://{}", url.scheme(), host);
    // `port()` is already None for the scheme's default port
    if let Some(port) = url.port() {
        pattern.push(':');
        pattern.push_str(&port.to_string());
    }
    pattern.push_str(url.path());

    if let Some(query) = url.query() {
        pattern.push('?');
        pattern.push_str(&pattern_query(query));
    }

    pattern
}

fn pattern_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() && is_numeric(value) => {
                format!("{}={}", key, ID_PLACEHOLDER)
            }
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
