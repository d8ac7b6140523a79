//! Statistics generation from the run database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::state::{RunStats, RunStatus};
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::HashMap;

/// Run statistics summary
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run_id: i64,
    pub project: String,
    pub start_url: String,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,

    /// Counters recorded by the crawler
    pub stats: RunStats,

    /// Pages stored for the run
    pub total_pages: u64,

    /// Pages that were actually fetched
    pub fetched_pages: u64,

    /// Edges stored for the run
    pub total_links: u64,

    /// Number of pages at each depth
    pub depth_breakdown: HashMap<u32, usize>,

    /// Number of mined flows
    pub total_flows: usize,
}

/// Loads statistics for a run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run` - The run to describe
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, run: &RunRecord) -> StorageResult<RunStatistics> {
    let pages = storage.list_pages(run.id)?;
    let fetched_pages = pages.iter().filter(|p| p.is_fetched()).count() as u64;

    Ok(RunStatistics {
        run_id: run.id,
        project: run.project.clone(),
        start_url: run.start_url.clone(),
        status: run.status,
        error_message: run.error_message.clone(),
        started_at: run.started_at.clone(),
        finished_at: run.finished_at.clone(),
        stats: run.stats,
        total_pages: pages.len() as u64,
        fetched_pages,
        total_links: storage.count_links(run.id)?,
        depth_breakdown: storage.get_depth_breakdown(run.id)?,
        total_flows: storage.list_flows(run.id)?.len(),
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("Run:");
    println!("  ID: {}", stats.run_id);
    println!("  Project: {}", stats.project);
    println!("  Start URL: {}", stats.start_url);
    println!("  Status: {}", stats.status);
    if let Some(reason) = stats.stats.finished_reason {
        println!("  Finished reason: {}", reason);
    }
    if let Some(error) = &stats.error_message {
        println!("  Error: {}", error);
    }
    if let Some(started) = &stats.started_at {
        println!("  Started: {}", started);
    }
    if let Some(finished) = &stats.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Graph:");
    println!("  Nodes: {}", stats.total_pages);
    println!("  Edges: {}", stats.total_links);
    println!("  Visited: {}", stats.stats.visited);
    println!("  Errors: {}", stats.stats.errors);
    println!("  Flows: {}", stats.total_flows);
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Depth:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort_by_key(|(depth, _)| **depth);
        for (depth, count) in depths {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    println!(
        "Fetch Rate: {:.1}% ({} / {} nodes fetched)",
        fetch_rate(stats),
        stats.fetched_pages,
        stats.total_pages
    );
}

fn fetch_rate(stats: &RunStatistics) -> f64 {
    if stats.total_pages > 0 {
        (stats.fetched_pages as f64 / stats.total_pages as f64) * 100.0
    } else {
        0.0
    }
}
