//! URL handling module for StateTrail
//!
//! This module provides link resolution, host matching for the allowlist,
//! and the display-only URL pattern used to group same-template pages.

mod matcher;
mod normalize;
mod pattern;

// Re-export main functions
pub use matcher::host_matches;
pub use normalize::{is_crawlable_scheme, normalize_link, parse_start_url};
pub use pattern::url_pattern;
