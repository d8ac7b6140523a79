//! Configuration module for StateTrail
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use statetrail::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("statetrail.toml")).unwrap();
//! println!("Crawling {} with {}", config.run.start_url, config.run.strategy);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, ExplorationConfig, OutputConfig, RunConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
