/// Checks if a host is covered by an allowlist domain entry
///
/// An entry covers the host itself and every subdomain below it. A leading
/// `*.` on the entry is accepted and means the same thing. Comparison is
/// case-insensitive.
///
/// # Arguments
///
/// * `rule` - The allowlist domain entry (e.g. "example.com")
/// * `host` - The host of the candidate URL
///
/// # Examples
///
/// ```
/// use statetrail::url::host_matches;
///
/// assert!(host_matches("example.com", "example.com"));
/// assert!(host_matches("example.com", "api.v2.example.com"));
/// assert!(!host_matches("example.com", "notexample.com"));
/// ```
pub fn host_matches(rule: &str, host: &str) -> bool {
    let rule = rule.trim();
    let rule = rule.strip_prefix("*.").unwrap_or(rule);
    if rule.is_empty() || host.is_empty() {
        return false;
    }

    let rule = rule.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == rule || host.ends_with(&format!(".{}", rule))
}
