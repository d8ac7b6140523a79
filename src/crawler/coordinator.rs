//! Crawl run coordinator
//!
//! Drives one run from QUEUED to a terminal status:
//! - Checks the start URL against the run's allowlist
//! - Opens the static or browser fetcher for the run's strategy
//! - Pulls URLs off the frontier, fetches them and records nodes and edges
//! - Publishes live events and periodic statistics
//! - Records the finish reason, or the crash message when the loop fails

use crate::config::Config;
use crate::crawler::browser::{ActionRanker, BrowserSession, StateChangeDetector};
use crate::crawler::fetcher::StaticFetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::{DiscoveredLink, PageSnapshot};
use crate::events::{EdgeCreatedEvent, EventHub, NodeCreatedEvent, RunEvent};
use crate::identity::{node_key, simple_node_key};
use crate::policy::BudgetTracker;
use crate::state::{FinishedReason, GraphState, RiskTags, RunStats, RunStatus, UiSignature};
use crate::storage::{
    build_har, lock, EvidenceStore, NewLink, NewRun, PageEvidence, PageFetch, RunRecord,
    SharedStorage,
};
use crate::url::{normalize_link, parse_start_url, url_pattern};
use crate::{StateTrailError, UrlError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// A STATS snapshot is persisted and published after every this many visits
const STATS_EVERY: usize = 5;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub stats: RunStats,
    pub error: Option<String>,
}

/// Fetcher chosen by the run's strategy
enum Fetcher {
    Static(StaticFetcher),
    Browser(BrowserSession),
}

impl Fetcher {
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, StateTrailError> {
        match self {
            Self::Static(fetcher) => fetcher.fetch(url).await,
            Self::Browser(session) => session.fetch(url).await,
        }
    }

    async fn close(self) {
        if let Self::Browser(session) = self {
            session.close().await;
        }
    }
}

/// Run-local crawl state, owned by the run's task
struct CrawlState {
    graph: GraphState,
    frontier: Frontier,
    edges: usize,
    errors: usize,
}

impl CrawlState {
    fn new(frontier: Frontier) -> Self {
        Self {
            graph: GraphState::new(),
            frontier,
            edges: 0,
            errors: 0,
        }
    }

    fn stats(&self) -> RunStats {
        RunStats {
            nodes: self.graph.node_count(),
            edges: self.edges,
            errors: self.errors,
            visited: self.graph.visited_count(),
            finished_reason: None,
        }
    }
}

/// Exploration heuristics handed to the browser session of a run
struct Heuristics {
    ranker: Box<dyn ActionRanker>,
    detector: Box<dyn StateChangeDetector>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    evidence: Arc<dyn EvidenceStore>,
    events: Arc<EventHub>,
    run_id: i64,
    heuristics: Option<Heuristics>,
}

impl Coordinator {
    /// Creates a coordinator for an already queued run
    ///
    /// # Arguments
    ///
    /// * `config` - Fetcher, browser and exploration settings
    /// * `storage` - Graph storage shared with the rest of the process
    /// * `evidence` - Blob store for screenshots, HAR logs and storage state
    /// * `events` - Hub the run publishes its live events to
    /// * `run_id` - A run in QUEUED status
    pub fn new(
        config: Arc<Config>,
        storage: SharedStorage,
        evidence: Arc<dyn EvidenceStore>,
        events: Arc<EventHub>,
        run_id: i64,
    ) -> Self {
        Self {
            config,
            storage,
            evidence,
            events,
            run_id,
            heuristics: None,
        }
    }

    /// Replaces the action ranker and state-change detector used by
    /// browser-mode exploration
    ///
    /// Static strategies never explore, so the heuristics go unused there.
    pub fn with_heuristics(
        mut self,
        ranker: Box<dyn ActionRanker>,
        detector: Box<dyn StateChangeDetector>,
    ) -> Self {
        self.heuristics = Some(Heuristics { ranker, detector });
        self
    }

    /// Stores a new QUEUED run built from the `[run]` section of a config
    ///
    /// # Returns
    ///
    /// * `Ok(i64)` - Id of the new run
    /// * `Err(StateTrailError)` - The run could not be stored
    pub fn queue_run(
        config: &Config,
        storage: &SharedStorage,
        config_hash: Option<String>,
    ) -> Result<i64, StateTrailError> {
        let run = NewRun {
            project: config.run.project.clone(),
            auth_context: config.run.auth_context.clone(),
            start_url: config.run.start_url.clone(),
            strategy: config.run.strategy,
            budget: config.run.budget,
            allowlist: config.run.allowlist.clone(),
            config_hash,
        };
        let run_id = lock(storage)?.create_run(&run)?;
        info!("Queued run {} for {}", run_id, run.start_url);
        Ok(run_id)
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Executes the run to completion
    ///
    /// Precondition failures and crashes inside the crawl loop end the run
    /// FAILED and are reported through the outcome. An `Err` means the run
    /// could not be loaded or its status could not be recorded.
    pub async fn run(mut self) -> Result<RunOutcome, StateTrailError> {
        let run = lock(&self.storage)?.get_run(self.run_id)?;
        if run.status != RunStatus::Queued {
            return Err(StateTrailError::InvalidTransition {
                from: run.status,
                to: RunStatus::Running,
            });
        }

        let start = match check_preconditions(&run) {
            Ok(start) => start,
            Err(e) => return self.fail_before_start(e),
        };

        lock(&self.storage)?.transition_run(
            self.run_id,
            RunStatus::Queued,
            RunStatus::Running,
            None,
        )?;
        self.events.publish(self.run_id, RunEvent::running());
        info!(
            "Starting run {} at {} (strategy={}, max_nodes={}, max_edges={}, max_depth={})",
            self.run_id,
            start,
            run.strategy.as_str(),
            run.budget.max_nodes,
            run.budget.max_edges,
            run.budget.max_depth
        );

        let tracker = run.budget.start();
        let mut state = CrawlState::new(Frontier::new(run.strategy));

        let result = match self.open_fetcher(&run, &start).await {
            Ok(fetcher) => {
                let result = self
                    .crawl(&fetcher, &run, &start, &tracker, &mut state)
                    .await;
                fetcher.close().await;
                result
            }
            Err(e) => Err(e),
        };

        self.finish(&tracker, &state, result)
    }

    /// Marks a run FAILED without entering the crawl loop
    fn fail_before_start(&self, reason: StateTrailError) -> Result<RunOutcome, StateTrailError> {
        let message = reason.to_string();
        warn!("Run {} rejected: {} ({:?})", self.run_id, message, reason);

        lock(&self.storage)?.transition_run(
            self.run_id,
            RunStatus::Queued,
            RunStatus::Failed,
            Some(&message),
        )?;
        self.events
            .publish(self.run_id, RunEvent::failed(message.clone()));

        Ok(RunOutcome {
            run_id: self.run_id,
            status: RunStatus::Failed,
            stats: RunStats::default(),
            error: Some(message),
        })
    }

    async fn open_fetcher(
        &mut self,
        run: &RunRecord,
        start: &Url,
    ) -> Result<Fetcher, StateTrailError> {
        if !run.strategy.is_browser() {
            return Ok(Fetcher::Static(StaticFetcher::new(&self.config.crawler)?));
        }

        let mut session = BrowserSession::launch(
            &self.config.browser,
            &self.config.exploration,
            self.config.crawler.max_body_chars,
        )
        .await?;
        if let Some(heuristics) = self.heuristics.take() {
            session = session.with_heuristics(heuristics.ranker, heuristics.detector);
        }

        if let Some(key) = &self.config.run.storage_state {
            match self.read_storage_state(key) {
                Ok(json) => {
                    if let Err(e) = session.apply_storage_state(&json, start).await {
                        warn!("Failed to apply storage state {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Failed to load storage state {}: {}", key, e),
            }
        }

        if let Some(script) = &self.config.run.login_script {
            if let Err(e) = session.run_login_script(start, script).await {
                warn!("Login script failed: {}", e);
            }
        }

        Ok(Fetcher::Browser(session))
    }

    /// Reads a storage-state document by evidence key, then as a local file
    fn read_storage_state(&self, key: &str) -> Result<String, StateTrailError> {
        match self.evidence.load_storage_state(key) {
            Ok(json) => Ok(json),
            Err(e) => {
                debug!("Storage state {} not in evidence store: {}", key, e);
                Ok(std::fs::read_to_string(key)?)
            }
        }
    }

    async fn crawl(
        &self,
        fetcher: &Fetcher,
        run: &RunRecord,
        start: &Url,
        tracker: &BudgetTracker,
        state: &mut CrawlState,
    ) -> Result<(), StateTrailError> {
        if !tracker.has_room(0, 0) {
            info!("Budget leaves no room for the start page");
            return Ok(());
        }

        let start_url = start.to_string();
        self.create_node(state, &start_url, 0)?;
        state.frontier.offer(&start_url);

        while tracker.has_room(state.graph.node_count(), state.edges) {
            let Some(url) = state.frontier.poll(state.graph.visited()) else {
                info!("Frontier is empty");
                break;
            };
            if state.graph.is_visited(&url) {
                continue;
            }

            let depth = state.graph.depth_of(&url).unwrap_or(0);
            state.graph.mark_visited(&url);
            if !tracker.depth_allowed(depth) {
                debug!("Skipping {} at depth {}", url, depth);
                continue;
            }

            match self.visit(fetcher, run, tracker, state, &url, depth).await {
                Ok(()) => {}
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => {
                    state.errors += 1;
                    warn!("Error visiting {}: {}", url, e);
                }
            }

            if state.graph.visited_count() % STATS_EVERY == 0 {
                let stats = state.stats();
                lock(&self.storage)?.update_run_stats(self.run_id, &stats)?;
                info!(
                    "Progress: {} visited, {} nodes, {} edges, {} errors, {} queued",
                    stats.visited,
                    stats.nodes,
                    stats.edges,
                    stats.errors,
                    state.frontier.len()
                );
                self.events.publish(self.run_id, RunEvent::Stats(stats));
            }
        }

        Ok(())
    }

    /// Fetches one page, stores what was seen and expands its links
    async fn visit(
        &self,
        fetcher: &Fetcher,
        run: &RunRecord,
        tracker: &BudgetTracker,
        state: &mut CrawlState,
        url: &str,
        depth: u32,
    ) -> Result<(), StateTrailError> {
        let page_id = match state.graph.node_for(url) {
            Some(id) => id,
            None => self.create_node(state, url, depth)?,
        };
        let target = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;

        let snapshot = fetcher.fetch(&target).await?;
        debug!(
            "Fetched {} (status={:?}, links={})",
            snapshot.final_url,
            snapshot.status,
            snapshot.links.len()
        );

        let fetch = PageFetch {
            title: snapshot.title.clone(),
            http_status: snapshot.status,
            content_type: snapshot.content_type.clone(),
            html_snapshot: snapshot.html_snapshot.clone(),
        };
        lock(&self.storage)?.mark_page_fetched(page_id, &fetch)?;

        let risk_tags = match &snapshot.ui_signature {
            Some(signature) => {
                self.attach_evidence(run, page_id, url, signature, &snapshot);
                signature.risk_tags()
            }
            None => RiskTags::default(),
        };

        let base = Url::parse(&snapshot.final_url).unwrap_or(target);
        self.expand(run, tracker, state, page_id, depth, &base, snapshot.links, risk_tags)
    }

    /// Stores browser evidence for a page; failures only cost the evidence
    fn attach_evidence(
        &self,
        run: &RunRecord,
        page_id: i64,
        url: &str,
        signature: &UiSignature,
        snapshot: &PageSnapshot,
    ) {
        let screenshot_key = snapshot.screenshot.as_ref().and_then(|png| {
            self.evidence
                .save_screenshot(self.run_id, page_id, png)
                .map_err(|e| warn!("Failed to save screenshot for {}: {}", url, e))
                .ok()
        });

        let network_log_key = if snapshot.network_requests.is_empty() {
            None
        } else {
            let har = build_har(&snapshot.network_requests);
            self.evidence
                .save_network_log(self.run_id, page_id, &har)
                .map_err(|e| warn!("Failed to save network log for {}: {}", url, e))
                .ok()
        };

        let evidence = PageEvidence {
            node_key: Some(node_key(
                url,
                run.auth_context.as_deref(),
                &signature.to_canonical_json(),
            )),
            ui_signature: Some(signature.clone()),
            screenshot_key,
            network_log_key,
        };

        if let Err(e) =
            lock(&self.storage).and_then(|mut storage| storage.attach_page_evidence(page_id, &evidence))
        {
            warn!("Failed to attach evidence to page {}: {}", page_id, e);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        run: &RunRecord,
        tracker: &BudgetTracker,
        state: &mut CrawlState,
        from_id: i64,
        depth: u32,
        base: &Url,
        links: Vec<DiscoveredLink>,
        risk_tags: RiskTags,
    ) -> Result<(), StateTrailError> {
        let to_depth = depth + 1;
        let found = links.len();
        let mut allowed = 0;
        let mut enqueued = 0;

        for link in links {
            if !tracker.has_room(state.graph.node_count(), state.edges) {
                break;
            }

            let Some(target) = normalize_link(base, &link.url) else {
                debug!("Dropping link {}: not normalizable", link.url);
                continue;
            };
            if !run.allowlist.allows(&target) {
                debug!("Dropping link {}: denied by allowlist", target);
                continue;
            }
            allowed += 1;
            if !tracker.depth_allowed(to_depth) {
                continue;
            }

            let to_url = target.to_string();
            let to_id = match state.graph.node_for(&to_url) {
                Some(id) => id,
                None => self.create_node(state, &to_url, to_depth)?,
            };

            if state.graph.record_edge(from_id, to_id) {
                let new_link = NewLink {
                    from_page_id: from_id,
                    to_page_id: to_id,
                    action_type: link.action_type,
                    anchor_text: link.anchor_text.clone(),
                    locator: link.locator.clone(),
                    risk_tags,
                    ..Default::default()
                };
                let inserted = lock(&self.storage)?.insert_link(self.run_id, &new_link)?;
                if let Some(edge) = inserted {
                    state.edges += 1;
                    self.events.publish(
                        self.run_id,
                        RunEvent::EdgeCreated(EdgeCreatedEvent {
                            id: edge.id,
                            from: edge.from_page_id,
                            to: edge.to_page_id,
                            action_type: edge.action_type,
                            anchor_text: edge.anchor_text,
                        }),
                    );
                    if !state.graph.is_visited(&to_url) {
                        state.frontier.record_inbound(&to_url);
                    }
                }
            }

            if !state.graph.is_visited(&to_url) && state.frontier.offer(&to_url) {
                enqueued += 1;
            }
        }

        if found > 0 {
            debug!(
                "Page {}: {} links found, {} allowed, {} enqueued (depth {})",
                from_id, found, allowed, enqueued, depth
            );
        }
        Ok(())
    }

    /// Gets or creates the page row for a URL and announces new nodes
    fn create_node(
        &self,
        state: &mut CrawlState,
        url: &str,
        depth: u32,
    ) -> Result<i64, StateTrailError> {
        let (page, created) = lock(&self.storage)?.get_or_create_page(
            self.run_id,
            url,
            depth,
            &simple_node_key(url),
            &url_pattern(url),
        )?;
        state.graph.remember_node(url, page.id, page.depth);

        if created {
            self.events.publish(
                self.run_id,
                RunEvent::NodeCreated(NodeCreatedEvent {
                    id: page.id,
                    url: page.url,
                    depth: page.depth,
                    node_key: page.node_key,
                    title: page.title,
                }),
            );
        }
        Ok(page.id)
    }

    /// Records the terminal status of a run that got past its preconditions
    ///
    /// A run whose success cannot be recorded is failed instead, so it never
    /// stays RUNNING.
    fn finish(
        &self,
        tracker: &BudgetTracker,
        state: &CrawlState,
        result: Result<(), StateTrailError>,
    ) -> Result<RunOutcome, StateTrailError> {
        let mut stats = state.stats();
        let reason = if tracker.deadline_passed() {
            FinishedReason::Time
        } else {
            FinishedReason::BudgetOrFrontier
        };

        let result = result.and_then(|()| {
            stats.finished_reason = Some(reason);
            self.record_success(&stats)
        });

        match result {
            Ok(()) => {
                self.events.publish(self.run_id, RunEvent::succeeded());
                self.events.publish(self.run_id, RunEvent::Stats(stats));

                info!(
                    "Run {} finished ({}): {} nodes, {} edges, {} visited, {} errors",
                    self.run_id, reason, stats.nodes, stats.edges, stats.visited, stats.errors
                );

                Ok(RunOutcome {
                    run_id: self.run_id,
                    status: RunStatus::Succeeded,
                    stats,
                    error: None,
                })
            }
            Err(e) => {
                stats.finished_reason = None;
                let message = format!("crawler crashed: {}: {}", e.kind(), e);
                error!("Run {} failed: {}", self.run_id, message);

                match lock(&self.storage) {
                    Ok(mut storage) => {
                        if let Err(err) = storage.update_run_stats(self.run_id, &stats) {
                            warn!("Failed to store partial stats: {}", err);
                        }
                        if let Err(err) = storage.transition_run(
                            self.run_id,
                            RunStatus::Running,
                            RunStatus::Failed,
                            Some(&message),
                        ) {
                            warn!("Failed to mark run {} failed: {}", self.run_id, err);
                        }
                    }
                    Err(err) => warn!("Failed to mark run {} failed: {}", self.run_id, err),
                }
                self.events
                    .publish(self.run_id, RunEvent::failed(message.clone()));

                Ok(RunOutcome {
                    run_id: self.run_id,
                    status: RunStatus::Failed,
                    stats,
                    error: Some(message),
                })
            }
        }
    }

    fn record_success(&self, stats: &RunStats) -> Result<(), StateTrailError> {
        let mut storage = lock(&self.storage)?;
        storage.update_run_stats(self.run_id, stats)?;
        storage.transition_run(self.run_id, RunStatus::Running, RunStatus::Succeeded, None)?;
        Ok(())
    }
}

/// Runs a coordinator on its own task, detached from the caller
pub fn spawn_crawl(coordinator: Coordinator) -> JoinHandle<Result<RunOutcome, StateTrailError>> {
    tokio::spawn(coordinator.run())
}

fn check_preconditions(run: &RunRecord) -> Result<Url, StateTrailError> {
    let start = parse_start_url(&run.start_url)
        .map_err(|_| StateTrailError::InvalidStartUrl(run.start_url.clone()))?;
    if !run.allowlist.allows(&start) {
        return Err(StateTrailError::StartUrlDenied(start.to_string()));
    }
    Ok(start)
}

/// Storage failures end the run; everything else only costs the page
fn is_fatal(error: &StateTrailError) -> bool {
    matches!(
        error,
        StateTrailError::StorageError(_)
            | StateTrailError::Database(_)
            | StateTrailError::InvalidTransition { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::browser::{ActionCandidate, Observation, StateChange};
    use crate::policy::AllowlistRules;
    use crate::storage::{
        shared, FlowRecord, FsEvidenceStore, LinkRecord, NewFlow, PageRecord, SqliteStorage,
        Storage, StorageError, StorageResult,
    };
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// SQLite storage that refuses to store a run's final stats
    struct FinalStatsRejected(SqliteStorage);

    impl Storage for FinalStatsRejected {
        fn create_run(&mut self, run: &NewRun) -> StorageResult<i64> {
            self.0.create_run(run)
        }
        fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
            self.0.get_run(run_id)
        }
        fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
            self.0.get_latest_run()
        }
        fn transition_run(
            &mut self,
            run_id: i64,
            from: RunStatus,
            to: RunStatus,
            error_message: Option<&str>,
        ) -> StorageResult<()> {
            self.0.transition_run(run_id, from, to, error_message)
        }
        fn update_run_stats(&mut self, run_id: i64, stats: &RunStats) -> StorageResult<()> {
            if stats.finished_reason.is_some() {
                return Err(StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
            }
            self.0.update_run_stats(run_id, stats)
        }
        fn get_or_create_page(
            &mut self,
            run_id: i64,
            url: &str,
            depth: u32,
            node_key: &str,
            url_pattern: &str,
        ) -> StorageResult<(PageRecord, bool)> {
            self.0.get_or_create_page(run_id, url, depth, node_key, url_pattern)
        }
        fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
            self.0.get_page(page_id)
        }
        fn find_page_by_url(&self, run_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
            self.0.find_page_by_url(run_id, url)
        }
        fn mark_page_fetched(&mut self, page_id: i64, fetch: &PageFetch) -> StorageResult<()> {
            self.0.mark_page_fetched(page_id, fetch)
        }
        fn attach_page_evidence(
            &mut self,
            page_id: i64,
            evidence: &PageEvidence,
        ) -> StorageResult<()> {
            self.0.attach_page_evidence(page_id, evidence)
        }
        fn list_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>> {
            self.0.list_pages(run_id)
        }
        fn count_pages(&self, run_id: i64) -> StorageResult<u64> {
            self.0.count_pages(run_id)
        }
        fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, usize>> {
            self.0.get_depth_breakdown(run_id)
        }
        fn insert_link(&mut self, run_id: i64, link: &NewLink) -> StorageResult<Option<LinkRecord>> {
            self.0.insert_link(run_id, link)
        }
        fn list_links(&self, run_id: i64) -> StorageResult<Vec<LinkRecord>> {
            self.0.list_links(run_id)
        }
        fn count_links(&self, run_id: i64) -> StorageResult<u64> {
            self.0.count_links(run_id)
        }
        fn save_flow(&mut self, flow: &NewFlow) -> StorageResult<i64> {
            self.0.save_flow(flow)
        }
        fn get_flow(&self, flow_id: i64) -> StorageResult<FlowRecord> {
            self.0.get_flow(flow_id)
        }
        fn list_flows(&self, run_id: i64) -> StorageResult<Vec<FlowRecord>> {
            self.0.list_flows(run_id)
        }
    }

    struct NoActions;

    impl ActionRanker for NoActions {
        fn rank(&self, _signature: &UiSignature) -> Vec<ActionCandidate> {
            Vec::new()
        }
    }

    struct NeverChanged;

    impl StateChangeDetector for NeverChanged {
        fn detect(&self, _before: &Observation, _after: &Observation) -> StateChange {
            StateChange::default()
        }
    }

    fn setup(start_url: &str, allowlist: AllowlistRules) -> (Coordinator, Arc<EventHub>, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = shared(SqliteStorage::new(&dir.path().join("test.db")).unwrap());

        let toml = format!("[run]\nstart-url = \"{}\"\n", start_url);
        let mut config = parse_config(&toml).unwrap();
        config.run.allowlist = allowlist;

        let run_id = Coordinator::queue_run(&config, &storage, None).unwrap();
        let events = Arc::new(EventHub::new());
        let evidence: Arc<dyn EvidenceStore> =
            Arc::new(FsEvidenceStore::new(dir.path().join("evidence")));
        let coordinator =
            Coordinator::new(Arc::new(config), storage, evidence, events.clone(), run_id);
        (coordinator, events, dir)
    }

    #[tokio::test]
    async fn test_invalid_start_url_fails_run() {
        let (coordinator, events, _dir) = setup("not a url", AllowlistRules::default());
        let storage = coordinator.storage.clone();
        let run_id = coordinator.run_id();
        let mut rx = events.subscribe(run_id);

        let outcome = coordinator.run().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("invalid startUrl"));

        let run = lock(&storage).unwrap().get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("invalid startUrl"));
        assert_eq!(lock(&storage).unwrap().count_pages(run_id).unwrap(), 0);

        assert_eq!(rx.recv().await.unwrap().kind(), "PING");
        assert_eq!(rx.recv().await.unwrap(), RunEvent::failed("invalid startUrl"));
    }

    #[tokio::test]
    async fn test_denied_start_url_fails_run() {
        let allowlist = AllowlistRules {
            domains: vec!["a.test".to_string()],
            ..Default::default()
        };
        let (coordinator, _events, _dir) = setup("https://b.test/", allowlist);

        let outcome = coordinator.run().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("startUrl denied by allowlist"));
        assert_eq!(outcome.stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_run_must_be_queued() {
        let (coordinator, _events, _dir) = setup("not a url", AllowlistRules::default());
        let storage = coordinator.storage.clone();
        let run_id = coordinator.run_id();
        lock(&storage)
            .unwrap()
            .transition_run(run_id, RunStatus::Queued, RunStatus::Running, None)
            .unwrap();

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, StateTrailError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_unrecordable_success_fails_run() {
        let dir = TempDir::new().unwrap();
        let sqlite = SqliteStorage::new(&dir.path().join("test.db")).unwrap();
        let storage: SharedStorage = shared(FinalStatsRejected(sqlite));
        let config = parse_config(
            "[run]\nstart-url = \"https://a.test/\"\n[run.budget]\nmaxNodes = 0\n",
        )
        .unwrap();
        let run_id = Coordinator::queue_run(&config, &storage, None).unwrap();

        let events = Arc::new(EventHub::new());
        let mut rx = events.subscribe(run_id);
        let evidence: Arc<dyn EvidenceStore> =
            Arc::new(FsEvidenceStore::new(dir.path().join("evidence")));
        let coordinator =
            Coordinator::new(Arc::new(config), storage.clone(), evidence, events, run_id);

        let outcome = coordinator.run().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .starts_with("crawler crashed: StorageError: "));
        assert!(outcome.stats.finished_reason.is_none());

        let run = lock(&storage).unwrap().get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message, outcome.error);

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RunEvent::Status(status) = event {
                statuses.push((status.status, status.error));
            }
        }
        assert_eq!(
            statuses,
            vec![
                (RunStatus::Running, None),
                (RunStatus::Failed, outcome.error.clone()),
            ]
        );
    }

    #[test]
    fn test_with_heuristics_replaces_defaults() {
        let (coordinator, _events, _dir) = setup("https://a.test/", AllowlistRules::default());
        assert!(coordinator.heuristics.is_none());

        let coordinator = coordinator.with_heuristics(Box::new(NoActions), Box::new(NeverChanged));
        let heuristics = coordinator.heuristics.as_ref().unwrap();
        let signature = UiSignature {
            ctas: vec![crate::state::Cta {
                text: "Menu".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(heuristics.ranker.rank(&signature).is_empty());

        let before = Observation::default();
        let after = Observation {
            url: "https://a.test/other".to_string(),
            ..Default::default()
        };
        assert!(!heuristics.detector.detect(&before, &after).changed());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(is_fatal(&StateTrailError::StorageError(
            crate::storage::StorageError::LockPoisoned
        )));
        assert!(!is_fatal(&StateTrailError::Fetch {
            url: "https://a.test/".to_string(),
            message: "timeout".to_string(),
        }));
    }
}
