use crate::flows::FlowSource;
use crate::storage::{
    FlowRecord, LinkRecord, NewFlow, PageRecord, RunRecord, Storage, StorageResult,
};
use crate::url::parse_start_url;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};
use url::Url;

/// Upper bound on the number of edge coverage flows mined from one run
pub const MAX_COVERAGE_FLOWS: usize = 50;

/// A run's stored graph, indexed for walking
struct RunGraph {
    pages: Vec<PageRecord>,
    outgoing: HashMap<i64, Vec<LinkRecord>>,
    edge_count: usize,
    start: PageRecord,
}

impl RunGraph {
    /// Loads pages and links of a run
    ///
    /// Returns `None` when the run has no edges or its start page is missing.
    fn load(storage: &dyn Storage, run: &RunRecord) -> StorageResult<Option<Self>> {
        let pages = storage.list_pages(run.id)?;
        let links = storage.list_links(run.id)?;
        if pages.is_empty() || links.is_empty() {
            return Ok(None);
        }

        let start_url = parse_start_url(&run.start_url)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| run.start_url.clone());
        let Some(start) = pages
            .iter()
            .find(|p| p.url == start_url || p.url == run.start_url)
            .cloned()
        else {
            debug!("Run {} has no page for start URL {}", run.id, run.start_url);
            return Ok(None);
        };

        let edge_count = links.len();
        let mut outgoing: HashMap<i64, Vec<LinkRecord>> = HashMap::new();
        for link in links {
            outgoing.entry(link.from_page_id).or_default().push(link);
        }

        Ok(Some(Self {
            pages,
            outgoing,
            edge_count,
            start,
        }))
    }

    fn outgoing(&self, page_id: i64) -> &[LinkRecord] {
        self.outgoing.get(&page_id).map_or(&[], Vec::as_slice)
    }

    /// Edge ids of the first-discovered shortest path to every reachable page
    fn shortest_paths(&self) -> HashMap<i64, Vec<i64>> {
        let mut paths: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut queue = VecDeque::new();

        paths.insert(self.start.id, Vec::new());
        queue.push_back(self.start.id);

        while let Some(current) = queue.pop_front() {
            let base = paths.get(&current).cloned().unwrap_or_default();
            for edge in self.outgoing(current) {
                if paths.contains_key(&edge.to_page_id) {
                    continue;
                }
                let mut path = base.clone();
                path.push(edge.id);
                paths.insert(edge.to_page_id, path);
                queue.push_back(edge.to_page_id);
            }
        }

        paths
    }
}

/// Mines shortest-path smoke flows from the start page
///
/// Targets are the reachable pages other than the start page, deepest first
/// with ties broken by page id. At most `max_flows` flows are returned.
///
/// # Arguments
///
/// * `storage` - Storage holding the run's graph
/// * `run` - The finished run
/// * `max_flows` - Maximum number of flows to mine
pub fn mine_smoke_flows(
    storage: &dyn Storage,
    run: &RunRecord,
    max_flows: usize,
) -> StorageResult<Vec<NewFlow>> {
    let Some(graph) = RunGraph::load(storage, run)? else {
        return Ok(Vec::new());
    };
    let paths = graph.shortest_paths();

    let mut targets: Vec<&PageRecord> = graph
        .pages
        .iter()
        .filter(|p| p.id != graph.start.id)
        .filter(|p| paths.get(&p.id).is_some_and(|path| !path.is_empty()))
        .collect();
    targets.sort_by(|a, b| b.depth.cmp(&a.depth).then(a.id.cmp(&b.id)));
    targets.truncate(max_flows);

    let from_label = page_label(&graph.start);
    let flows: Vec<NewFlow> = targets
        .into_iter()
        .map(|target| NewFlow {
            run_id: run.id,
            project: run.project.clone(),
            auth_context: run.auth_context.clone(),
            name: format!("Smoke: {} → {}", from_label, page_label(target)),
            source: FlowSource::AutoSmoke,
            steps: paths.get(&target.id).cloned().unwrap_or_default(),
            meta: json!({
                "suite": "smoke",
                "from": graph.start.id,
                "to": target.id,
            }),
        })
        .collect();

    info!("Mined {} smoke flows from run {}", flows.len(), run.id);
    Ok(flows)
}

/// Mines greedy edge coverage flows from the start page
///
/// Each flow follows uncovered outgoing edges from the start page until it
/// reaches a page with none left, then the walk restarts at the start page.
/// Mining stops once every edge is covered, no uncovered edge is reachable,
/// or [`MAX_COVERAGE_FLOWS`] flows exist.
pub fn mine_edge_coverage_flows(
    storage: &dyn Storage,
    run: &RunRecord,
) -> StorageResult<Vec<NewFlow>> {
    let Some(graph) = RunGraph::load(storage, run)? else {
        return Ok(Vec::new());
    };

    let mut covered: HashSet<i64> = HashSet::new();
    let mut walks: Vec<Vec<i64>> = Vec::new();
    let mut path: Vec<i64> = Vec::new();
    let mut current = graph.start.id;

    while covered.len() < graph.edge_count && walks.len() < MAX_COVERAGE_FLOWS {
        let next = graph
            .outgoing(current)
            .iter()
            .find(|edge| !covered.contains(&edge.id));

        match next {
            Some(edge) => {
                covered.insert(edge.id);
                path.push(edge.id);
                current = edge.to_page_id;
            }
            None if path.is_empty() => break,
            None => {
                walks.push(std::mem::take(&mut path));
                current = graph.start.id;
            }
        }
    }
    if !path.is_empty() {
        walks.push(path);
    }

    let flows: Vec<NewFlow> = walks
        .into_iter()
        .enumerate()
        .map(|(i, steps)| NewFlow {
            run_id: run.id,
            project: run.project.clone(),
            auth_context: run.auth_context.clone(),
            name: format!("Edge Coverage #{}", i + 1),
            source: FlowSource::AutoEdgeCoverage,
            meta: json!({"suite": "coverage", "edgeCount": steps.len()}),
            steps,
        })
        .collect();

    info!(
        "Mined {} coverage flows covering {}/{} edges of run {}",
        flows.len(),
        covered.len(),
        graph.edge_count,
        run.id
    );
    Ok(flows)
}

/// Persists mined flows and returns them as stored
pub fn save_flows(storage: &mut dyn Storage, flows: &[NewFlow]) -> StorageResult<Vec<FlowRecord>> {
    flows
        .iter()
        .map(|flow| {
            let id = storage.save_flow(flow)?;
            storage.get_flow(id)
        })
        .collect()
}

/// Human-readable label of a page: its title, else the last path segment,
/// else the host
pub fn page_label(page: &PageRecord) -> String {
    if let Some(title) = page.title.as_deref().map(str::trim) {
        if !title.is_empty() {
            return title.to_string();
        }
    }

    let Ok(url) = Url::parse(&page.url) else {
        return page.url.clone();
    };
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());
    match (segment, url.host_str()) {
        (Some(segment), _) => segment.to_string(),
        (None, Some(host)) => host.to_string(),
        (None, None) => page.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
    use crate::storage::{NewLink, NewRun, PageFetch, SqliteStorage};

    struct Fixture {
        storage: SqliteStorage,
        run: RunRecord,
    }

    impl Fixture {
        fn new() -> Self {
            let mut storage = SqliteStorage::new_in_memory().unwrap();
            let run_id = storage
                .create_run(&NewRun {
                    project: "demo".to_string(),
                    auth_context: Some("admin".to_string()),
                    start_url: "https://a.test".to_string(),
                    strategy: CrawlStrategy::Bfs,
                    budget: CrawlBudget::default(),
                    allowlist: AllowlistRules::default(),
                    config_hash: None,
                })
                .unwrap();
            let run = storage.get_run(run_id).unwrap();
            Self { storage, run }
        }

        fn page(&mut self, path: &str, depth: u32) -> i64 {
            let url = format!("https://a.test{}", path);
            self.storage
                .get_or_create_page(self.run.id, &url, depth, "key", &url)
                .unwrap()
                .0
                .id
        }

        fn link(&mut self, from: i64, to: i64) -> i64 {
            let link = NewLink {
                from_page_id: from,
                to_page_id: to,
                ..Default::default()
            };
            self.storage.insert_link(self.run.id, &link).unwrap().unwrap().id
        }
    }

    #[test]
    fn test_smoke_flows_pick_deepest_targets() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let b = fx.page("/a/b", 2);
        let c = fx.page("/a/b/c", 3);
        let sa = fx.link(s, a);
        let ab = fx.link(a, b);
        let bc = fx.link(b, c);

        let flows = mine_smoke_flows(&fx.storage, &fx.run, 2).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].steps, vec![sa, ab, bc]);
        assert_eq!(flows[0].name, "Smoke: a.test → c");
        assert_eq!(flows[0].meta["to"], c);
        assert_eq!(flows[1].steps, vec![sa, ab]);
        assert_eq!(flows[1].source, FlowSource::AutoSmoke);
        assert_eq!(flows[1].auth_context.as_deref(), Some("admin"));
    }

    #[test]
    fn test_smoke_flows_use_shortest_path() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let b = fx.page("/b", 1);
        fx.link(s, a);
        fx.link(a, b);
        let sb = fx.link(s, b);

        let flows = mine_smoke_flows(&fx.storage, &fx.run, 10).unwrap();
        let to_b = flows.iter().find(|f| f.meta["to"] == b).unwrap();
        assert_eq!(to_b.steps, vec![sb]);
    }

    #[test]
    fn test_smoke_flows_skip_unreachable_pages() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let orphan = fx.page("/deep/orphan", 5);
        let other = fx.page("/other", 4);
        fx.link(s, a);
        fx.link(orphan, other);

        let flows = mine_smoke_flows(&fx.storage, &fx.run, 10).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].meta["to"], a);
    }

    #[test]
    fn test_no_flows_without_edges() {
        let mut fx = Fixture::new();
        fx.page("/", 0);
        assert!(mine_smoke_flows(&fx.storage, &fx.run, 10).unwrap().is_empty());
        assert!(mine_edge_coverage_flows(&fx.storage, &fx.run).unwrap().is_empty());
    }

    #[test]
    fn test_edge_coverage_walks() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let d = fx.page("/d", 1);
        let b = fx.page("/a/b", 2);
        let sa = fx.link(s, a);
        let sd = fx.link(s, d);
        let ab = fx.link(a, b);

        let flows = mine_edge_coverage_flows(&fx.storage, &fx.run).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].name, "Edge Coverage #1");
        assert_eq!(flows[0].steps, vec![sa, ab]);
        assert_eq!(flows[0].meta["edgeCount"], 2);
        assert_eq!(flows[1].steps, vec![sd]);
        assert_eq!(flows[1].source, FlowSource::AutoEdgeCoverage);
    }

    #[test]
    fn test_edge_coverage_follows_cycles() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let sa = fx.link(s, a);
        let as_ = fx.link(a, s);

        let flows = mine_edge_coverage_flows(&fx.storage, &fx.run).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].steps, vec![sa, as_]);
    }

    #[test]
    fn test_edge_coverage_stops_on_unreachable_edges() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        let x = fx.page("/x", 3);
        let y = fx.page("/y", 4);
        let sa = fx.link(s, a);
        fx.link(x, y);

        let flows = mine_edge_coverage_flows(&fx.storage, &fx.run).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].steps, vec![sa]);
    }

    #[test]
    fn test_edge_coverage_is_capped() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        for i in 0..(MAX_COVERAGE_FLOWS + 5) {
            let leaf = fx.page(&format!("/leaf/{}", i), 1);
            fx.link(s, leaf);
        }

        let flows = mine_edge_coverage_flows(&fx.storage, &fx.run).unwrap();
        assert_eq!(flows.len(), MAX_COVERAGE_FLOWS);
    }

    #[test]
    fn test_save_flows() {
        let mut fx = Fixture::new();
        let s = fx.page("/", 0);
        let a = fx.page("/a", 1);
        fx.link(s, a);

        let flows = mine_smoke_flows(&fx.storage, &fx.run, 10).unwrap();
        let saved = save_flows(&mut fx.storage, &flows).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, flows[0].name);
        assert_eq!(fx.storage.list_flows(fx.run.id).unwrap().len(), 1);
    }

    #[test]
    fn test_page_label() {
        let mut fx = Fixture::new();
        let id = fx.page("/docs/intro/", 1);
        let mut page = fx.storage.get_page(id).unwrap();
        assert_eq!(page_label(&page), "intro");

        fx.storage
            .mark_page_fetched(
                id,
                &PageFetch {
                    title: Some("Intro".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        page = fx.storage.get_page(id).unwrap();
        assert_eq!(page_label(&page), "Intro");

        page.title = Some("  ".to_string());
        page.url = "https://a.test/".to_string();
        assert_eq!(page_label(&page), "a.test");
    }
}
