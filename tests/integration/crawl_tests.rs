//! Integration tests for the crawler
//!
//! These tests use wiremock to serve small sites and run static-mode crawls
//! end-to-end against them.

use statetrail::config::{parse_config, Config};
use statetrail::crawler::{spawn_crawl, Coordinator, RunOutcome};
use statetrail::events::{EventHub, RunEvent};
use statetrail::flows::{mine_edge_coverage_flows, mine_smoke_flows, save_flows, FlowSource};
use statetrail::policy::CrawlStrategy;
use statetrail::state::{FinishedReason, RunStatus};
use statetrail::storage::{
    lock, shared, EvidenceStore, FsEvidenceStore, SharedStorage, SqliteStorage,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves an HTML page whose anchors point at `links`
async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{0}">{0}</a>"#, href))
        .collect();
    mount_html(
        server,
        route,
        &format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        ),
    )
    .await;
}

async fn mount_html(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// Creates a test configuration; `run_extra` is appended to the `[run]` table
fn create_test_config(dir: &TempDir, start_url: &str, run_extra: &str) -> Config {
    let toml = format!(
        r#"
[output]
database-path = "{}"
evidence-dir = "{}"

[run]
project = "it"
start-url = "{}"
strategy = "BFS"
{}
"#,
        dir.path().join("test.db").display(),
        dir.path().join("evidence").display(),
        start_url,
        run_extra
    );
    parse_config(&toml).expect("Failed to parse test config")
}

/// Queues and runs a crawl, returning its outcome and every event it published
async fn run_crawl(config: Config) -> (RunOutcome, SharedStorage, Vec<RunEvent>) {
    let storage = shared(
        SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open DB"),
    );
    let evidence: Arc<dyn EvidenceStore> =
        Arc::new(FsEvidenceStore::new(&config.output.evidence_dir));
    let events = Arc::new(EventHub::new());

    let run_id = Coordinator::queue_run(&config, &storage, None).expect("Failed to queue run");
    let mut rx = events.subscribe(run_id);

    let coordinator = Coordinator::new(
        Arc::new(config),
        storage.clone(),
        evidence,
        events.clone(),
        run_id,
    );
    let outcome = spawn_crawl(coordinator)
        .await
        .expect("Crawl task panicked")
        .expect("Crawl failed to record its outcome");

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    (outcome, storage, received)
}

#[tokio::test]
async fn test_full_crawl_records_graph() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a", "/b"]).await;
    mount_page(&server, "/a", "Page A", &["/b", "/"]).await;
    mount_page(&server, "/b", "Page B", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.nodes, 3);
    assert_eq!(outcome.stats.edges, 4);
    assert_eq!(outcome.stats.visited, 3);
    assert_eq!(outcome.stats.errors, 0);
    assert_eq!(
        outcome.stats.finished_reason,
        Some(FinishedReason::BudgetOrFrontier)
    );

    let storage = lock(&storage).unwrap();
    let run = storage.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.stats, outcome.stats);
    assert!(run.finished_at.is_some());

    let pages = storage.list_pages(outcome.run_id).unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|p| p.is_fetched()));
    let page_a = pages.iter().find(|p| p.url.ends_with("/a")).unwrap();
    assert_eq!(page_a.title.as_deref(), Some("Page A"));
    assert_eq!(page_a.depth, 1);
    assert_eq!(page_a.http_status, Some(200));
}

#[tokio::test]
async fn test_max_nodes_one() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/b"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.budget]\nmaxNodes = 1\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(
        outcome.stats.finished_reason,
        Some(FinishedReason::BudgetOrFrontier)
    );

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_pages(outcome.run_id).unwrap(), 1);
    assert_eq!(storage.count_links(outcome.run_id).unwrap(), 0);
}

#[tokio::test]
async fn test_max_nodes_zero() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/b"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.budget]\nmaxNodes = 0\n",
    );
    let (outcome, storage, events) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.nodes, 0);
    assert_eq!(outcome.stats.visited, 0);
    assert_eq!(
        outcome.stats.finished_reason,
        Some(FinishedReason::BudgetOrFrontier)
    );
    assert!(!events.iter().any(|e| e.kind() == "NODE_CREATED"));
    assert!(server.received_requests().await.unwrap().is_empty());

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_pages(outcome.run_id).unwrap(), 0);
}

#[tokio::test]
async fn test_max_edges_caps_links() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/1", "/2", "/3", "/4", "/5"]).await;
    for route in ["/1", "/2", "/3", "/4", "/5"] {
        mount_page(&server, route, route, &["/"]).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.budget]\nmaxEdges = 2\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.edges, 2);
    assert_eq!(
        outcome.stats.finished_reason,
        Some(FinishedReason::BudgetOrFrontier)
    );

    let storage = lock(&storage).unwrap();
    assert!(storage.count_links(outcome.run_id).unwrap() <= 2);
    assert_eq!(storage.count_links(outcome.run_id).unwrap(), 2);
}

#[tokio::test]
async fn test_deadline_ends_run_with_time() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.budget]\nmaxMinutes = 0\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.finished_reason, Some(FinishedReason::Time));

    let run = lock(&storage).unwrap().get_run(outcome.run_id).unwrap();
    assert_eq!(run.stats.finished_reason, Some(FinishedReason::Time));
}

#[tokio::test]
async fn test_invalid_start_url() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "not a url", "");
    let (outcome, storage, events) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("invalid startUrl"));

    let storage = lock(&storage).unwrap();
    let run = storage.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("invalid startUrl"));
    assert_eq!(storage.count_pages(outcome.run_id).unwrap(), 0);

    let kinds: Vec<_> = events.iter().map(RunEvent::kind).collect();
    assert_eq!(kinds, vec!["PING", "STATUS"]);
}

#[tokio::test]
async fn test_allowlist_drops_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        "Home",
        &["https://b.test/x", "/logout", "/ok"],
    )
    .await;
    mount_page(&server, "/ok", "Ok", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.allowlist]\ndomains = [\"127.0.0.1\"]\ndeny = [\"/logout\"]\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;
    assert_eq!(outcome.status, RunStatus::Succeeded);

    let urls: Vec<String> = lock(&storage)
        .unwrap()
        .list_pages(outcome.run_id)
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|u| u.starts_with(&server.uri())));
    assert!(!urls.iter().any(|u| u.contains("b.test") || u.ends_with("/logout")));

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert!(!requested.contains(&"/logout".to_string()));
}

#[tokio::test]
async fn test_start_url_denied() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "https://b.test/",
        "[run.allowlist]\ndomains = [\"a.test\"]\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("startUrl denied by allowlist"));
    assert_eq!(lock(&storage).unwrap().count_pages(outcome.run_id).unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_links_collapse() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r##"<html><body>
        <a href="/x">One</a>
        <a href="/x#details">Two</a>
        <a href="x">Three</a>
        </body></html>"##,
    )
    .await;
    mount_page(&server, "/x", "X", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    let (outcome, storage, _) = run_crawl(config).await;

    assert_eq!(outcome.stats.nodes, 2);
    assert_eq!(outcome.stats.edges, 1);

    let storage = lock(&storage).unwrap();
    let links = storage.list_links(outcome.run_id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].anchor_text.as_deref(), Some("One"));
}

#[tokio::test]
async fn test_bfs_order_and_depth_cap() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a", "/b"]).await;
    mount_page(&server, "/a", "A", &["/a/deep"]).await;
    mount_page(&server, "/b", "B", &["/b/deep"]).await;
    mount_page(&server, "/a/deep", "A deep", &["/a/deep/deeper"]).await;
    mount_page(&server, "/b/deep", "B deep", &[]).await;
    mount_page(&server, "/a/deep/deeper", "Too deep", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        &format!("{}/", server.uri()),
        "[run.budget]\nmaxDepth = 2\n",
    );
    let (outcome, storage, _) = run_crawl(config).await;
    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.nodes, 5);

    let pages = lock(&storage).unwrap().list_pages(outcome.run_id).unwrap();
    assert!(pages.iter().all(|p| p.depth <= 2));
    assert!(!pages.iter().any(|p| p.url.ends_with("/deeper")));

    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested, vec!["/", "/a", "/b", "/a/deep", "/b/deep"]);
}

#[tokio::test]
async fn test_mcs_fetches_most_linked_first() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a", "/b", "/c"]).await;
    mount_page(&server, "/a", "A", &["/c"]).await;
    mount_page(&server, "/b", "B", &[]).await;
    mount_page(&server, "/c", "C", &[]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    config.run.strategy = CrawlStrategy::Mcs;
    let (outcome, _storage, _) = run_crawl(config).await;
    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.visited, 4);

    // /c has two inbound links once /a is expanded, so it jumps ahead of /b
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested, vec!["/", "/a", "/c", "/b"]);
}

#[tokio::test]
async fn test_event_stream() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/1", "/2", "/3", "/4", "/5"]).await;
    for route in ["/1", "/2", "/3", "/4", "/5"] {
        mount_page(&server, route, route, &[]).await;
    }

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    let (outcome, _storage, events) = run_crawl(config).await;
    assert_eq!(outcome.stats.visited, 6);

    assert_eq!(events[0].kind(), "PING");
    match &events[1] {
        RunEvent::Status(status) => assert_eq!(status.status, RunStatus::Running),
        other => panic!("expected RUNNING status, got {:?}", other),
    }
    match &events[2] {
        RunEvent::NodeCreated(node) => {
            assert_eq!(node.depth, 0);
            assert!(node.title.is_none());
        }
        other => panic!("expected start node, got {:?}", other),
    }

    let mut nodes = HashSet::new();
    for event in &events {
        match event {
            RunEvent::NodeCreated(node) => {
                nodes.insert(node.id);
            }
            RunEvent::EdgeCreated(edge) => {
                assert!(nodes.contains(&edge.from) && nodes.contains(&edge.to));
            }
            _ => {}
        }
    }
    assert_eq!(nodes.len(), 6);

    let stats: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Stats(stats) => Some(*stats),
            _ => None,
        })
        .collect();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].visited, 5);
    assert!(stats[0].finished_reason.is_none());
    assert_eq!(stats[1], outcome.stats);

    let n = events.len();
    match &events[n - 2] {
        RunEvent::Status(status) => assert_eq!(status.status, RunStatus::Succeeded),
        other => panic!("expected SUCCEEDED status, got {:?}", other),
    }
    assert_eq!(events[n - 1].kind(), "STATS");
}

#[tokio::test]
async fn test_fetch_errors_are_counted() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["http://127.0.0.1:1/down"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    let (outcome, _storage, _) = run_crawl(config).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.stats.nodes, 2);
    assert_eq!(outcome.stats.visited, 2);
    assert_eq!(outcome.stats.errors, 1);
}

#[tokio::test]
async fn test_flow_mining_after_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", &["/a"]).await;
    mount_page(&server, "/a", "Section", &["/a/b"]).await;
    mount_page(&server, "/a/b", "Detail", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, &format!("{}/", server.uri()), "");
    let (outcome, storage, _) = run_crawl(config).await;
    assert_eq!(outcome.stats.edges, 2);

    let mut storage = lock(&storage).unwrap();
    let run = storage.get_run(outcome.run_id).unwrap();
    let links = storage.list_links(run.id).unwrap();

    let smoke = mine_smoke_flows(&*storage, &run, 10).unwrap();
    assert_eq!(smoke.len(), 2);
    assert_eq!(smoke[0].name, "Smoke: Home → Detail");
    assert_eq!(smoke[0].steps, vec![links[0].id, links[1].id]);
    assert_eq!(smoke[1].steps, vec![links[0].id]);

    let coverage = mine_edge_coverage_flows(&*storage, &run).unwrap();
    assert_eq!(coverage.len(), 1);
    assert_eq!(coverage[0].steps.len(), 2);

    let mut flows = smoke;
    flows.extend(coverage);
    let saved = save_flows(&mut *storage, &flows).unwrap();
    assert_eq!(saved.len(), 3);

    let stored = storage.list_flows(run.id).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        stored
            .iter()
            .filter(|f| f.source == FlowSource::AutoEdgeCoverage)
            .count(),
        1
    );
}
