//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the StateTrail database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl runs and their lifecycle
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    auth_context TEXT,
    start_url TEXT NOT NULL,
    strategy TEXT NOT NULL,
    budget_json TEXT NOT NULL,
    allowlist_json TEXT NOT NULL,
    config_hash TEXT,
    status TEXT NOT NULL,
    stats_json TEXT NOT NULL DEFAULT '{}',
    error_message TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT
);

-- Graph nodes, one per (run, url)
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    node_key TEXT NOT NULL,
    url TEXT NOT NULL,
    url_pattern TEXT NOT NULL,
    depth INTEGER NOT NULL,
    title TEXT,
    http_status INTEGER,
    content_type TEXT,
    html_snapshot TEXT,
    ui_signature TEXT,
    screenshot_key TEXT,
    network_log_key TEXT,
    discovered_at TEXT NOT NULL,
    fetched_at TEXT,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_node_key ON pages(node_key);

-- Graph edges, one per (run, from, to)
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    from_page_id INTEGER NOT NULL REFERENCES pages(id),
    to_page_id INTEGER NOT NULL REFERENCES pages(id),
    action_type TEXT NOT NULL,
    anchor_text TEXT,
    locator TEXT,
    payload TEXT,
    risk_tags TEXT NOT NULL DEFAULT '{}',
    http_evidence TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(run_id, from_page_id, to_page_id)
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_page_id);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_page_id);

-- Mined test flows
CREATE TABLE IF NOT EXISTS flows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    project TEXT NOT NULL,
    auth_context TEXT,
    name TEXT NOT NULL,
    source TEXT NOT NULL,
    steps TEXT NOT NULL,
    meta TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_flows_run ON flows(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
