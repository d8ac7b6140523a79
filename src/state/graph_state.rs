use std::collections::{HashMap, HashSet};

/// Run-local dedup state owned by a single crawl
///
/// Nothing here is shared between runs, so no synchronization is needed.
/// The storage layer stays the source of truth; these maps only save
/// round-trips and keep the hot loop from re-emitting events.
#[derive(Debug, Default)]
pub struct GraphState {
    visited: HashSet<String>,
    edge_seen: HashSet<(i64, i64)>,
    depth_by_url: HashMap<String, u32>,
    url_to_node: HashMap<String, i64>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a URL as fully processed. Returns false if it already was.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Records an edge pair. Returns true the first time a pair is seen.
    pub fn record_edge(&mut self, from: i64, to: i64) -> bool {
        self.edge_seen.insert((from, to))
    }

    pub fn has_edge(&self, from: i64, to: i64) -> bool {
        self.edge_seen.contains(&(from, to))
    }

    /// Depth at which a URL was first discovered
    pub fn depth_of(&self, url: &str) -> Option<u32> {
        self.depth_by_url.get(url).copied()
    }

    /// Caches the node id and first-discovery depth of a URL
    ///
    /// A URL keeps the depth it was first discovered at; later discoveries
    /// at other depths do not overwrite it.
    pub fn remember_node(&mut self, url: &str, node_id: i64, depth: u32) {
        self.url_to_node.insert(url.to_string(), node_id);
        self.depth_by_url.entry(url.to_string()).or_insert(depth);
    }

    pub fn node_for(&self, url: &str) -> Option<i64> {
        self.url_to_node.get(url).copied()
    }

    /// Number of distinct nodes known to this run
    pub fn node_count(&self) -> usize {
        self.url_to_node.len()
    }
}
