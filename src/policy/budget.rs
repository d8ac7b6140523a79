use crate::ConfigError;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_MAX_NODES: usize = 100;
const DEFAULT_MAX_EDGES: usize = 400;
const DEFAULT_MAX_DEPTH: u32 = 6;
const DEFAULT_MAX_MINUTES: u64 = 5;

/// Resource limits for a single crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawBudget")]
pub struct CrawlBudget {
    pub max_nodes: usize,
    pub max_edges: usize,
    pub max_depth: u32,
    pub max_minutes: u64,
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_edges: DEFAULT_MAX_EDGES,
            max_depth: DEFAULT_MAX_DEPTH,
            max_minutes: DEFAULT_MAX_MINUTES,
        }
    }
}

impl CrawlBudget {
    /// Parses a budget from the JSON stored on a run
    ///
    /// Missing or malformed fields fall back to their defaults; only a
    /// document that is not JSON at all is an error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Total wall-clock time the run may take
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_minutes.saturating_mul(60))
    }

    /// Starts tracking this budget from now
    pub fn start(self) -> BudgetTracker {
        BudgetTracker::with_deadline(self, Instant::now() + self.max_duration())
    }
}

/// Budget plus an absolute deadline, checked by the crawl loop
#[derive(Debug, Clone, Copy)]
pub struct BudgetTracker {
    budget: CrawlBudget,
    deadline: Instant,
}

impl BudgetTracker {
    /// Creates a tracker with an explicit deadline
    pub fn with_deadline(budget: CrawlBudget, deadline: Instant) -> Self {
        Self { budget, deadline }
    }

    pub fn budget(&self) -> &CrawlBudget {
        &self.budget
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// True once the wall-clock deadline has passed
    pub fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// True while time remains and neither node nor edge limits are reached
    ///
    /// # Arguments
    ///
    /// * `nodes` - Nodes persisted so far in this run
    /// * `edges` - Edges persisted so far in this run
    pub fn has_room(&self, nodes: usize, edges: usize) -> bool {
        nodes < self.budget.max_nodes && edges < self.budget.max_edges && !self.deadline_passed()
    }

    /// True if a node at `depth` may be fetched or created
    pub fn depth_allowed(&self, depth: u32) -> bool {
        depth <= self.budget.max_depth
    }
}

/// Budget as it appears on the wire, before defaults are applied
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBudget {
    #[serde(rename = "maxNodes", alias = "max-nodes")]
    max_nodes: Option<LenientInt>,
    #[serde(rename = "maxEdges", alias = "max-edges")]
    max_edges: Option<LenientInt>,
    #[serde(rename = "maxDepth", alias = "max-depth")]
    max_depth: Option<LenientInt>,
    #[serde(rename = "maxMinutes", alias = "max-minutes")]
    max_minutes: Option<LenientInt>,
}

impl From<RawBudget> for CrawlBudget {
    fn from(raw: RawBudget) -> Self {
        Self {
            max_nodes: lenient(raw.max_nodes, DEFAULT_MAX_NODES),
            max_edges: lenient(raw.max_edges, DEFAULT_MAX_EDGES),
            max_depth: lenient(raw.max_depth, DEFAULT_MAX_DEPTH),
            max_minutes: lenient(raw.max_minutes, DEFAULT_MAX_MINUTES),
        }
    }
}

/// An integer that tolerates floats, numeric strings and junk
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LenientInt {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl LenientInt {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn lenient<T: TryFrom<i64>>(value: Option<LenientInt>, default: T) -> T {
    value
        .as_ref()
        .and_then(LenientInt::as_i64)
        .and_then(|v| T::try_from(v).ok())
        .unwrap_or(default)
}
