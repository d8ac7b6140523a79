//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::flows::FlowSource;
use crate::policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
use crate::state::{ActionType, RunStats, RunStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    FlowRecord, LinkRecord, NewFlow, NewLink, NewRun, PageEvidence, PageFetch, PageRecord,
    RunRecord,
};
use crate::StateTrailError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, project, auth_context, start_url, strategy, budget_json,
    allowlist_json, config_hash, status, stats_json, error_message, created_at, started_at,
    finished_at";

const PAGE_COLUMNS: &str = "id, run_id, node_key, url, url_pattern, depth, title, http_status,
    content_type, html_snapshot, ui_signature, screenshot_key, network_log_key, discovered_at,
    fetched_at";

const LINK_COLUMNS: &str = "id, run_id, from_page_id, to_page_id, action_type, anchor_text,
    locator, payload, risk_tags, http_evidence, created_at";

const FLOW_COLUMNS: &str =
    "id, run_id, project, auth_context, name, source, steps, meta, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StateTrailError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, StateTrailError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, StateTrailError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn get_link(&self, link_id: i64) -> StorageResult<LinkRecord> {
        let sql = format!("SELECT {} FROM links WHERE id = ?1", LINK_COLUMNS);
        Ok(self.conn.query_row(&sql, params![link_id], link_from_row)?)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Option<T> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let strategy: String = row.get(4)?;
    let budget: String = row.get(5)?;
    let allowlist: String = row.get(6)?;
    let status: String = row.get(8)?;
    let stats: Option<String> = row.get(9)?;

    Ok(RunRecord {
        id: row.get(0)?,
        project: row.get(1)?,
        auth_context: row.get(2)?,
        start_url: row.get(3)?,
        strategy: CrawlStrategy::from_nullable(Some(&strategy)),
        budget: CrawlBudget::from_json(&budget).unwrap_or_default(),
        allowlist: AllowlistRules::from_json(&allowlist).unwrap_or_default(),
        config_hash: row.get(7)?,
        status: RunStatus::from_db_string(&status).unwrap_or(RunStatus::Failed),
        stats: decode_json(stats).unwrap_or_default(),
        error_message: row.get(10)?,
        created_at: row.get(11)?,
        started_at: row.get(12)?,
        finished_at: row.get(13)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        node_key: row.get(2)?,
        url: row.get(3)?,
        url_pattern: row.get(4)?,
        depth: row.get(5)?,
        title: row.get(6)?,
        http_status: row.get(7)?,
        content_type: row.get(8)?,
        html_snapshot: row.get(9)?,
        ui_signature: decode_json(row.get(10)?),
        screenshot_key: row.get(11)?,
        network_log_key: row.get(12)?,
        discovered_at: row.get(13)?,
        fetched_at: row.get(14)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    let action: String = row.get(4)?;
    Ok(LinkRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        from_page_id: row.get(2)?,
        to_page_id: row.get(3)?,
        action_type: ActionType::from_db_string(&action).unwrap_or_default(),
        anchor_text: row.get(5)?,
        locator: row.get(6)?,
        payload: decode_json(row.get(7)?),
        risk_tags: decode_json(row.get(8)?).unwrap_or_default(),
        http_evidence: decode_json(row.get(9)?),
        created_at: row.get(10)?,
    })
}

fn flow_from_row(row: &Row<'_>) -> rusqlite::Result<FlowRecord> {
    let source: String = row.get(5)?;
    Ok(FlowRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        project: row.get(2)?,
        auth_context: row.get(3)?,
        name: row.get(4)?,
        source: FlowSource::from_db_string(&source).unwrap_or(FlowSource::Manual),
        steps: decode_json(row.get(6)?).unwrap_or_default(),
        meta: decode_json(row.get(7)?).unwrap_or(serde_json::Value::Null),
        created_at: row.get(8)?,
    })
}

fn optional_json<T: serde::Serialize>(value: Option<&T>) -> StorageResult<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run: &NewRun) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (project, auth_context, start_url, strategy, budget_json,
             allowlist_json, config_hash, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.project,
                run.auth_context,
                run.start_url,
                run.strategy.as_str(),
                serde_json::to_string(&run.budget)?,
                serde_json::to_string(&run.allowlist)?,
                run.config_hash,
                RunStatus::Queued.to_db_string(),
                now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        Ok(self.conn.query_row(&sql, [], run_from_row).optional()?)
    }

    fn transition_run(
        &mut self,
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition { from, to });
        }

        let updated = if to == RunStatus::Running {
            self.conn.execute(
                "UPDATE runs SET status = ?1, started_at = ?2 WHERE id = ?3 AND status = ?4",
                params![to.to_db_string(), now(), run_id, from.to_db_string()],
            )?
        } else {
            self.conn.execute(
                "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    to.to_db_string(),
                    now(),
                    error_message,
                    run_id,
                    from.to_db_string()
                ],
            )?
        };

        if updated == 0 {
            let current = self.get_run(run_id)?;
            return Err(StorageError::InvalidTransition {
                from: current.status,
                to,
            });
        }
        Ok(())
    }

    fn update_run_stats(&mut self, run_id: i64, stats: &RunStats) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET stats_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(stats)?, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Management =====

    fn get_or_create_page(
        &mut self,
        run_id: i64,
        url: &str,
        depth: u32,
        node_key: &str,
        url_pattern: &str,
    ) -> StorageResult<(PageRecord, bool)> {
        let inserted = self.conn.execute(
            "INSERT INTO pages (run_id, node_key, url, url_pattern, depth, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(run_id, url) DO NOTHING",
            params![run_id, node_key, url, url_pattern, depth, now()],
        )?;

        let page = self
            .find_page_by_url(run_id, url)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;

        Ok((page, inserted > 0))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn find_page_by_url(&self, run_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE run_id = ?1 AND url = ?2",
            PAGE_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![run_id, url], page_from_row)
            .optional()?)
    }

    fn mark_page_fetched(&mut self, page_id: i64, fetch: &PageFetch) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE pages SET title = ?1, http_status = ?2, content_type = ?3,
             html_snapshot = ?4, fetched_at = ?5
             WHERE id = ?6",
            params![
                fetch.title,
                fetch.http_status,
                fetch.content_type,
                fetch.html_snapshot,
                now(),
                page_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn attach_page_evidence(
        &mut self,
        page_id: i64,
        evidence: &PageEvidence,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE pages SET
             node_key = COALESCE(?1, node_key),
             ui_signature = COALESCE(?2, ui_signature),
             screenshot_key = COALESCE(?3, screenshot_key),
             network_log_key = COALESCE(?4, network_log_key)
             WHERE id = ?5",
            params![
                evidence.node_key,
                optional_json(evidence.ui_signature.as_ref())?,
                evidence.screenshot_key,
                evidence.network_log_key,
                page_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }

    fn list_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE run_id = ?1 ORDER BY id",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![run_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn count_pages(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, usize>> {
        let mut stmt = self.conn.prepare(
            "SELECT depth, COUNT(*) FROM pages WHERE run_id = ?1 GROUP BY depth ORDER BY depth",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count);
        }
        Ok(breakdown)
    }

    // ===== Link Management =====

    fn insert_link(&mut self, run_id: i64, link: &NewLink) -> StorageResult<Option<LinkRecord>> {
        let inserted = self.conn.execute(
            "INSERT INTO links (run_id, from_page_id, to_page_id, action_type, anchor_text,
             locator, payload, risk_tags, http_evidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(run_id, from_page_id, to_page_id) DO NOTHING",
            params![
                run_id,
                link.from_page_id,
                link.to_page_id,
                link.action_type.to_db_string(),
                link.anchor_text,
                link.locator,
                optional_json(link.payload.as_ref())?,
                serde_json::to_string(&link.risk_tags)?,
                optional_json(link.http_evidence.as_ref())?,
                now(),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();
        Ok(Some(self.get_link(id)?))
    }

    fn list_links(&self, run_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let sql = format!(
            "SELECT {} FROM links WHERE run_id = ?1 ORDER BY id",
            LINK_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let links = stmt
            .query_map(params![run_id], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    fn count_links(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Flow Management =====

    fn save_flow(&mut self, flow: &NewFlow) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO flows (run_id, project, auth_context, name, source, steps, meta, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                flow.run_id,
                flow.project,
                flow.auth_context,
                flow.name,
                flow.source.to_db_string(),
                serde_json::to_string(&flow.steps)?,
                serde_json::to_string(&flow.meta)?,
                now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_flow(&self, flow_id: i64) -> StorageResult<FlowRecord> {
        let sql = format!("SELECT {} FROM flows WHERE id = ?1", FLOW_COLUMNS);
        self.conn
            .query_row(&sql, params![flow_id], flow_from_row)
            .optional()?
            .ok_or(StorageError::FlowNotFound(flow_id))
    }

    fn list_flows(&self, run_id: i64) -> StorageResult<Vec<FlowRecord>> {
        let sql = format!(
            "SELECT {} FROM flows WHERE run_id = ?1 ORDER BY id",
            FLOW_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let flows = stmt
            .query_map(params![run_id], flow_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(flows)
    }
}
