//! StateTrail: a state-graph crawler for web applications
//!
//! This crate explores a web application from a start URL, records every
//! distinct page state as a node and every observed transition as an edge,
//! and mines the resulting graph into ordered test flows.

pub mod config;
pub mod crawler;
pub mod events;
pub mod flows;
pub mod identity;
pub mod output;
pub mod policy;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for StateTrail operations
#[derive(Debug, Error)]
pub enum StateTrailError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid startUrl")]
    InvalidStartUrl(String),

    #[error("startUrl denied by allowlist")]
    StartUrlDenied(String),

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition {
        from: state::RunStatus,
        to: state::RunStatus,
    },

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Evidence store error: {0}")]
    Evidence(#[from] storage::EvidenceError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateTrailError {
    /// Short classification of the error, used in run failure messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::InvalidStartUrl(_) => "InvalidStartUrl",
            Self::StartUrlDenied(_) => "StartUrlDenied",
            Self::Fetch { .. } => "FetchError",
            Self::Browser(_) | Self::Cdp(_) => "BrowserError",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Database(_) => "DatabaseError",
            Self::StorageError(_) => "StorageError",
            Self::Evidence(_) => "EvidenceError",
            Self::UrlError(_) => "UrlError",
            Self::Reqwest(_) => "HttpError",
            Self::Json(_) => "JsonError",
            Self::Io(_) => "IoError",
        }
    }

    /// True for the errors that abort a run before the crawl loop starts
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidStartUrl(_) | Self::StartUrlDenied(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for StateTrail operations
pub type Result<T> = std::result::Result<T, StateTrailError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{spawn_crawl, Coordinator, RunOutcome};
pub use events::{EventHub, RunEvent};
pub use identity::{node_key, simple_node_key};
pub use policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
pub use state::{ActionType, FinishedReason, RunStatus};
pub use url::url_pattern;
