//! Node identity hashing
//!
//! A node key identifies a page state. It combines the URL with the auth
//! context the page was seen under and, when available, the serialized UI
//! signature of the page.

use sha2::{Digest, Sha256};

/// Auth context used when a run has none
pub const ANONYMOUS_CONTEXT: &str = "anonymous";

/// Hex-encoded SHA-256 of a string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the full node key of a page state
///
/// The key is `sha256(url | context | sha256(signature))`, where a missing
/// context becomes `anonymous` and an empty signature contributes an empty
/// segment.
///
/// # Arguments
///
/// * `url` - Page URL
/// * `auth_context` - Auth profile the page was seen under, if any
/// * `ui_signature` - Serialized UI signature, empty when not captured
pub fn node_key(url: &str, auth_context: Option<&str>, ui_signature: &str) -> String {
    let context = auth_context
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(ANONYMOUS_CONTEXT);
    let signature_hash = if ui_signature.is_empty() {
        String::new()
    } else {
        sha256_hex(ui_signature)
    };
    sha256_hex(&format!("{}|{}|{}", url, context, signature_hash))
}

/// Computes the discovery-time node key from the URL alone
pub fn simple_node_key(url: &str) -> String {
    sha256_hex(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_node_key_is_deterministic() {
        let a = node_key("https://a.test/", Some("admin"), "{\"domHash\":\"1\"}");
        let b = node_key("https://a.test/", Some("admin"), "{\"domHash\":\"1\"}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_node_key_changes_with_each_input() {
        let base = node_key("https://a.test/", Some("admin"), "sig");
        assert_ne!(base, node_key("https://a.test/x", Some("admin"), "sig"));
        assert_ne!(base, node_key("https://a.test/", Some("viewer"), "sig"));
        assert_ne!(base, node_key("https://a.test/", Some("admin"), "sig2"));
        assert_ne!(base, node_key("https://a.test/", Some("admin"), ""));
    }

    #[test]
    fn test_missing_context_is_anonymous() {
        assert_eq!(
            node_key("https://a.test/", None, "sig"),
            node_key("https://a.test/", Some("anonymous"), "sig")
        );
        assert_eq!(
            node_key("https://a.test/", Some("  "), "sig"),
            node_key("https://a.test/", None, "sig")
        );
    }

    #[test]
    fn test_node_key_layout() {
        let expected = sha256_hex(&format!("https://a.test/|anonymous|{}", sha256_hex("sig")));
        assert_eq!(node_key("https://a.test/", None, "sig"), expected);

        let expected = sha256_hex("https://a.test/|anonymous|");
        assert_eq!(node_key("https://a.test/", None, ""), expected);
    }

    #[test]
    fn test_simple_node_key() {
        assert_eq!(simple_node_key("https://a.test/"), sha256_hex("https://a.test/"));
        assert_ne!(
            simple_node_key("https://a.test/"),
            node_key("https://a.test/", None, "")
        );
    }
}
