//! Flow mining
//!
//! After a run finishes, its stored graph is mined into flows: ordered edge
//! sequences that replay a path through the application. Two miners exist:
//! - Smoke flows follow the shortest path from the start page to the deepest
//!   reachable pages
//! - Edge coverage flows are greedy walks that together take every edge
//!   reachable from the start page at least once

mod miner;

pub use miner::{
    mine_edge_coverage_flows, mine_smoke_flows, page_label, save_flows, MAX_COVERAGE_FLOWS,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowSource {
    AutoSmoke,
    AutoEdgeCoverage,
    Manual,
}

impl FlowSource {
    /// Converts the source to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::AutoSmoke => "AUTO_SMOKE",
            Self::AutoEdgeCoverage => "AUTO_EDGE_COVERAGE",
            Self::Manual => "MANUAL",
        }
    }

    /// Parses a source from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "AUTO_SMOKE" => Some(Self::AutoSmoke),
            "AUTO_EDGE_COVERAGE" => Some(Self::AutoEdgeCoverage),
            "MANUAL" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for FlowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_strings() {
        for source in [
            FlowSource::AutoSmoke,
            FlowSource::AutoEdgeCoverage,
            FlowSource::Manual,
        ] {
            assert_eq!(FlowSource::from_db_string(source.to_db_string()), Some(source));
        }
        assert_eq!(FlowSource::from_db_string("auto_smoke"), None);
    }
}
