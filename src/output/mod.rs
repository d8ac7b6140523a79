//! Output module for reporting on finished runs
//!
//! This module handles:
//! - Printing run statistics
//! - Exporting a run's graph as JSON
//! - Writing a markdown report of mined flows
//! - Generating Playwright test skeletons from flows

mod graph;
mod markdown;
pub mod stats;
mod testgen;

pub use graph::{export_graph, write_graph, GraphEdge, GraphExport, GraphNode};
pub use markdown::{format_flow_report, write_flow_report};
pub use stats::{load_statistics, print_statistics, RunStatistics};
pub use testgen::generate_test;

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
