use crate::url::host_matches;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Allowlist policy for discovered URLs
///
/// Empty `domains` or `path_prefixes` means that dimension is unrestricted.
/// `deny` prefixes are checked against the URL path and always win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowlistRules {
    /// Hosts (and their subdomains) that may be crawled
    pub domains: Vec<String>,

    /// Path prefixes that may be crawled
    #[serde(alias = "path-prefixes")]
    pub path_prefixes: Vec<String>,

    /// Path prefixes that are never crawled
    pub deny: Vec<String>,
}

impl AllowlistRules {
    /// Parses rules from the JSON stored on a run
    ///
    /// A blank document yields the unrestricted policy.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Checks whether a URL passes the allowlist
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute candidate URL
    ///
    /// # Returns
    ///
    /// * `true` - The URL may be added to the graph
    /// * `false` - The URL must be skipped
    pub fn allows(&self, url: &Url) -> bool {
        if !self.domains.is_empty() {
            let Some(host) = url.host_str() else {
                return false;
            };
            if !self.domains.iter().any(|d| host_matches(d, host)) {
                return false;
            }
        }

        let path = if url.path().trim().is_empty() {
            "/"
        } else {
            url.path()
        };

        if !self.path_prefixes.is_empty()
            && !self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            return false;
        }

        !self.deny.iter().any(|d| path.starts_with(d.as_str()))
    }

    /// True when no rule restricts anything
    pub fn is_unrestricted(&self) -> bool {
        self.domains.is_empty() && self.path_prefixes.is_empty() && self.deny.is_empty()
    }
}
