//! Storage module for persisting crawl data
//!
//! This module handles all persistence for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run lifecycle and statistics
//! - Atomic get-or-create of pages and links
//! - Mined flows
//! - Evidence blobs (screenshots, network logs, auth storage state)

mod evidence;
mod schema;
mod sqlite;
mod traits;

pub use evidence::{
    build_har, EvidenceError, EvidenceResult, EvidenceStore, FsEvidenceStore, NetworkRequest,
};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::flows::FlowSource;
use crate::policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
use crate::state::{ActionType, RiskTags, RunStats, RunStatus, UiSignature};
use crate::StateTrailError;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the orchestrator and its callers
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Opens (or creates) the SQLite database at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StateTrailError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, StateTrailError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across tasks
pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping a poisoned lock to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Parameters for creating a crawl run
#[derive(Debug, Clone)]
pub struct NewRun {
    pub project: String,
    pub auth_context: Option<String>,
    pub start_url: String,
    pub strategy: CrawlStrategy,
    pub budget: CrawlBudget,
    pub allowlist: AllowlistRules,
    pub config_hash: Option<String>,
}

/// A crawl run as stored
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub project: String,
    pub auth_context: Option<String>,
    pub start_url: String,
    pub strategy: CrawlStrategy,
    pub budget: CrawlBudget,
    pub allowlist: AllowlistRules,
    pub config_hash: Option<String>,
    pub status: RunStatus,
    pub stats: RunStats,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// A page (graph node) as stored
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub run_id: i64,
    pub node_key: String,
    pub url: String,
    pub url_pattern: String,
    pub depth: u32,
    pub title: Option<String>,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub html_snapshot: Option<String>,
    pub ui_signature: Option<UiSignature>,
    pub screenshot_key: Option<String>,
    pub network_log_key: Option<String>,
    pub discovered_at: String,
    pub fetched_at: Option<String>,
}

impl PageRecord {
    pub fn is_fetched(&self) -> bool {
        self.fetched_at.is_some()
    }
}

/// Result of fetching a page, written once per visit
#[derive(Debug, Clone, Default)]
pub struct PageFetch {
    pub title: Option<String>,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    pub html_snapshot: Option<String>,
}

/// Browser-mode evidence attached to a fetched page
#[derive(Debug, Clone, Default)]
pub struct PageEvidence {
    pub node_key: Option<String>,
    pub ui_signature: Option<UiSignature>,
    pub screenshot_key: Option<String>,
    pub network_log_key: Option<String>,
}

/// Parameters for creating an edge
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub from_page_id: i64,
    pub to_page_id: i64,
    pub action_type: ActionType,
    pub anchor_text: Option<String>,
    pub locator: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub risk_tags: RiskTags,
    pub http_evidence: Option<serde_json::Value>,
}

/// An edge as stored
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub id: i64,
    pub run_id: i64,
    pub from_page_id: i64,
    pub to_page_id: i64,
    pub action_type: ActionType,
    pub anchor_text: Option<String>,
    pub locator: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub risk_tags: RiskTags,
    pub http_evidence: Option<serde_json::Value>,
    pub created_at: String,
}

/// Parameters for saving a flow
#[derive(Debug, Clone)]
pub struct NewFlow {
    pub run_id: i64,
    pub project: String,
    pub auth_context: Option<String>,
    pub name: String,
    pub source: FlowSource,
    /// Edge ids in walk order
    pub steps: Vec<i64>,
    pub meta: serde_json::Value,
}

/// A flow as stored
#[derive(Debug, Clone)]
pub struct FlowRecord {
    pub id: i64,
    pub run_id: i64,
    pub project: String,
    pub auth_context: Option<String>,
    pub name: String,
    pub source: FlowSource,
    pub steps: Vec<i64>,
    pub meta: serde_json::Value,
    pub created_at: String,
}
