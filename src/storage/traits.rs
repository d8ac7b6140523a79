//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{RunStats, RunStatus};
use crate::storage::{
    FlowRecord, LinkRecord, NewFlow, NewLink, NewRun, PageEvidence, PageFetch, PageRecord,
    RunRecord,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Flow not found: {0}")]
    FlowNotFound(i64),

    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every persistence operation the crawler and the flow
/// miner need. Create operations are idempotent: callers never have to
/// catch a uniqueness violation.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `QUEUED` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, run: &NewRun) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Moves a run from `from` to `to`
    ///
    /// The update only applies if the run is currently in `from`; otherwise
    /// `StorageError::InvalidTransition` is returned and nothing changes.
    /// Entering `RUNNING` stamps `started_at`, entering a terminal state
    /// stamps `finished_at`.
    ///
    /// # Arguments
    ///
    /// * `run_id` - The run to update
    /// * `from` - Status the run must currently have
    /// * `to` - New status
    /// * `error_message` - Stored alongside a `FAILED` status
    fn transition_run(
        &mut self,
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Replaces the stats snapshot of a run
    fn update_run_stats(&mut self, run_id: i64, stats: &RunStats) -> StorageResult<()>;

    // ===== Page Management =====

    /// Returns the page for `(run_id, url)`, creating it if needed
    ///
    /// Safe under concurrent callers: exactly one caller observes
    /// `created == true` for a given pair.
    ///
    /// # Returns
    ///
    /// The page record and whether this call created it
    fn get_or_create_page(
        &mut self,
        run_id: i64,
        url: &str,
        depth: u32,
        node_key: &str,
        url_pattern: &str,
    ) -> StorageResult<(PageRecord, bool)>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Finds the page of a run by URL
    fn find_page_by_url(&self, run_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Records the outcome of fetching a page and stamps `fetched_at`
    fn mark_page_fetched(&mut self, page_id: i64, fetch: &PageFetch) -> StorageResult<()>;

    /// Attaches browser evidence to a page; `None` fields are left as they are
    fn attach_page_evidence(&mut self, page_id: i64, evidence: &PageEvidence)
        -> StorageResult<()>;

    /// Lists all pages of a run ordered by ID
    fn list_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Counts the pages of a run
    fn count_pages(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets page count breakdown by depth
    ///
    /// Returns a map of depth -> number of pages at that depth
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, usize>>;

    // ===== Link Management =====

    /// Inserts an edge unless the `(run, from, to)` pair already exists
    ///
    /// # Returns
    ///
    /// * `Some(LinkRecord)` - The edge was created by this call
    /// * `None` - The pair was already present
    fn insert_link(&mut self, run_id: i64, link: &NewLink) -> StorageResult<Option<LinkRecord>>;

    /// Lists all edges of a run ordered by ID
    fn list_links(&self, run_id: i64) -> StorageResult<Vec<LinkRecord>>;

    /// Counts the edges of a run
    fn count_links(&self, run_id: i64) -> StorageResult<u64>;

    // ===== Flow Management =====

    /// Saves a mined flow and returns its ID
    fn save_flow(&mut self, flow: &NewFlow) -> StorageResult<i64>;

    /// Gets a flow by ID
    fn get_flow(&self, flow_id: i64) -> StorageResult<FlowRecord>;

    /// Lists the flows of a run ordered by ID
    fn list_flows(&self, run_id: i64) -> StorageResult<Vec<FlowRecord>>;
}
