//! Crawler module for exploring a web application
//!
//! This module contains the core crawling logic, including:
//! - Frontier scheduling (breadth-first or most-connected-score)
//! - Static HTTP fetching and HTML link extraction
//! - Browser-driven fetching with heuristic UI-action exploration
//! - Overall crawl coordination

pub mod browser;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use browser::BrowserSession;
pub use coordinator::{spawn_crawl, Coordinator, RunOutcome};
pub use fetcher::{build_http_client, StaticFetcher};
pub use frontier::Frontier;
pub use parser::{parse_html, truncate_chars, ParsedPage, MAX_ANCHOR_CHARS};

use crate::state::{ActionType, UiSignature};
use crate::storage::NetworkRequest;

/// A transition target found on a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute http(s) URL, fragment already stripped
    pub url: String,
    pub anchor_text: Option<String>,
    pub action_type: ActionType,
    /// Selector of the element that revealed the link, for UI actions
    pub locator: Option<String>,
}

impl DiscoveredLink {
    /// A plain `<a href>` link
    pub fn navigate(url: String, anchor_text: Option<String>) -> Self {
        Self {
            url,
            anchor_text,
            action_type: ActionType::Navigate,
            locator: None,
        }
    }

    /// A link revealed by clicking a UI element
    pub fn click(url: String, anchor_text: Option<String>, locator: Option<String>) -> Self {
        Self {
            url,
            anchor_text,
            action_type: ActionType::Click,
            locator,
        }
    }
}

/// Everything a fetch strategy learned about one page
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// URL after redirects
    pub final_url: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub html_snapshot: Option<String>,
    pub links: Vec<DiscoveredLink>,

    /// Browser mode only
    pub ui_signature: Option<UiSignature>,
    /// Browser mode only
    pub network_requests: Vec<NetworkRequest>,
    /// PNG bytes, browser mode only
    pub screenshot: Option<Vec<u8>>,
}
