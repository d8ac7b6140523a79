use crate::policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
use serde::{Deserialize, Serialize};

/// Main configuration structure for StateTrail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub exploration: ExplorationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub run: RunConfig,
}

/// Static fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// User agent sent with every static request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// HTML snapshots longer than this many characters are cut
    pub max_body_chars: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "StateTrailBot/0.1".to_string(),
            request_timeout_secs: 10,
            max_body_chars: 200_000,
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Upper bound for a single navigation
    pub navigation_timeout_ms: u64,

    /// Fixed wait after DOM content is loaded, for client-side rendering
    pub hydration_wait_ms: u64,

    /// How long to wait for the network to go quiet; timing out is ignored
    pub network_idle_timeout_ms: u64,

    /// Fixed wait after the network-idle phase
    pub post_idle_wait_ms: u64,

    /// Chromium binary; auto-detected when absent
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            navigation_timeout_ms: 15_000,
            hydration_wait_ms: 3_000,
            network_idle_timeout_ms: 5_000,
            post_idle_wait_ms: 1_000,
            executable: None,
        }
    }
}

/// Tuning constants for action-based exploration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExplorationConfig {
    /// Exploration stops once this many links were found on a page
    pub max_links: usize,

    /// How long a role-matched element may take to become visible
    pub visible_timeout_ms: u64,

    /// Timeout for a click or a candidate navigation
    pub click_timeout_ms: u64,

    /// Fixed wait before and after the settle phase
    pub settle_wait_ms: u64,

    /// Network-idle wait inside the settle phase
    pub settle_idle_timeout_ms: u64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            max_links: 20,
            visible_timeout_ms: 2_000,
            click_timeout_ms: 5_000,
            settle_wait_ms: 500,
            settle_idle_timeout_ms: 2_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Root directory for screenshots, network logs and storage state
    pub evidence_dir: String,

    /// Path to the markdown flow report
    pub report_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./statetrail.db".to_string(),
            evidence_dir: "./evidence".to_string(),
            report_path: None,
        }
    }
}

/// The run to execute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    #[serde(default = "default_project")]
    pub project: String,

    /// Kept as text: an unparsable start URL fails the run, not the config
    pub start_url: String,

    #[serde(default)]
    pub strategy: CrawlStrategy,

    /// Auth profile name; `anonymous` when absent
    #[serde(default)]
    pub auth_context: Option<String>,

    /// Evidence key or file path of a storage-state document whose cookies are applied
    #[serde(default)]
    pub storage_state: Option<String>,

    /// JavaScript evaluated once on the start page before crawling
    #[serde(default)]
    pub login_script: Option<String>,

    #[serde(default)]
    pub budget: CrawlBudget,

    #[serde(default)]
    pub allowlist: AllowlistRules,
}

fn default_project() -> String {
    "default".to_string()
}
