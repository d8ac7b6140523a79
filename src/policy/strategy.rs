use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Frontier ordering combined with fetch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlStrategy {
    /// FIFO frontier, static HTTP fetch
    #[default]
    Bfs,
    /// Most-connected-score frontier, static HTTP fetch
    Mcs,
    /// FIFO frontier, headless browser fetch
    BrowserBfs,
    /// Most-connected-score frontier, headless browser fetch
    BrowserMcs,
}

impl CrawlStrategy {
    /// Parses a strategy name leniently
    ///
    /// Matching ignores case and surrounding whitespace. Missing or unknown
    /// names resolve to [`CrawlStrategy::Bfs`].
    pub fn from_nullable(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_uppercase()).as_deref() {
            Some("MCS") => Self::Mcs,
            Some("BROWSER_BFS") => Self::BrowserBfs,
            Some("BROWSER_MCS") => Self::BrowserMcs,
            _ => Self::Bfs,
        }
    }

    /// True when pages are fetched through a headless browser
    pub fn is_browser(&self) -> bool {
        matches!(self, Self::BrowserBfs | Self::BrowserMcs)
    }

    /// The frontier ordering with the fetch mode stripped
    pub fn base(&self) -> Self {
        match self {
            Self::Bfs | Self::BrowserBfs => Self::Bfs,
            Self::Mcs | Self::BrowserMcs => Self::Mcs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bfs => "BFS",
            Self::Mcs => "MCS",
            Self::BrowserBfs => "BROWSER_BFS",
            Self::BrowserMcs => "BROWSER_MCS",
        }
    }
}

impl fmt::Display for CrawlStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CrawlStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CrawlStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_nullable(value.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nullable() {
        assert_eq!(CrawlStrategy::from_nullable(Some("BFS")), CrawlStrategy::Bfs);
        assert_eq!(CrawlStrategy::from_nullable(Some("mcs")), CrawlStrategy::Mcs);
        assert_eq!(
            CrawlStrategy::from_nullable(Some("  browser_bfs ")),
            CrawlStrategy::BrowserBfs
        );
        assert_eq!(
            CrawlStrategy::from_nullable(Some("Browser_MCS")),
            CrawlStrategy::BrowserMcs
        );
    }

    #[test]
    fn test_unknown_and_missing_default_to_bfs() {
        assert_eq!(CrawlStrategy::from_nullable(None), CrawlStrategy::Bfs);
        assert_eq!(CrawlStrategy::from_nullable(Some("")), CrawlStrategy::Bfs);
        assert_eq!(CrawlStrategy::from_nullable(Some("DFS")), CrawlStrategy::Bfs);
    }

    #[test]
    fn test_browser_and_base() {
        assert!(!CrawlStrategy::Bfs.is_browser());
        assert!(!CrawlStrategy::Mcs.is_browser());
        assert!(CrawlStrategy::BrowserBfs.is_browser());
        assert!(CrawlStrategy::BrowserMcs.is_browser());

        assert_eq!(CrawlStrategy::BrowserBfs.base(), CrawlStrategy::Bfs);
        assert_eq!(CrawlStrategy::BrowserMcs.base(), CrawlStrategy::Mcs);
        assert_eq!(CrawlStrategy::Mcs.base(), CrawlStrategy::Mcs);
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&CrawlStrategy::BrowserMcs).unwrap();
        assert_eq!(json, "\"BROWSER_MCS\"");

        let parsed: CrawlStrategy = serde_json::from_str("\"browser_bfs\"").unwrap();
        assert_eq!(parsed, CrawlStrategy::BrowserBfs);

        let parsed: CrawlStrategy = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, CrawlStrategy::Bfs);
    }
}
