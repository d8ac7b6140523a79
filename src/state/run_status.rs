use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a crawl run
///
/// A run is created `Queued`, moves to `Running` once, and then ends in
/// exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Checks whether moving from this status to `next` is legal
    ///
    /// A queued run may fail directly when its preconditions are rejected
    /// before the crawl loop starts.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Why a successful run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishedReason {
    /// The deadline passed
    #[serde(rename = "TIME")]
    Time,
    /// A node or edge budget was reached, or the frontier ran dry
    #[serde(rename = "BUDGET_OR_FRONTIER")]
    BudgetOrFrontier,
}

impl FinishedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "TIME",
            Self::BudgetOrFrontier => "BUDGET_OR_FRONTIER",
        }
    }
}

impl fmt::Display for FinishedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters of a run, stored on the run and published as STATS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub nodes: usize,
    pub edges: usize,
    pub errors: usize,
    pub visited: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_reason: Option<FinishedReason>,
}
