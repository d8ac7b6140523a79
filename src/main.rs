//! StateTrail main entry point
//!
//! This is the command-line interface for the StateTrail web-app crawler.

use anyhow::{bail, Context};
use clap::Parser;
use statetrail::config::{load_config_with_hash, Config};
use statetrail::crawler::{spawn_crawl, Coordinator};
use statetrail::events::EventHub;
use statetrail::flows::{mine_edge_coverage_flows, mine_smoke_flows, save_flows};
use statetrail::output::{
    export_graph, generate_test, load_statistics, print_statistics, write_flow_report, write_graph,
};
use statetrail::state::RunStatus;
use statetrail::storage::{
    lock, open_storage, shared, EvidenceStore, FsEvidenceStore, RunRecord, SharedStorage, Storage,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Number of smoke flows mined after a successful crawl
const SMOKE_FLOWS: usize = 10;

/// Report path used when the config names none
const DEFAULT_REPORT_PATH: &str = "./flows.md";

/// StateTrail: a state-graph crawler for web applications
///
/// StateTrail explores a web application from a start URL, records every
/// distinct page state and the transitions between them, and mines the
/// resulting graph into smoke and edge-coverage test flows.
#[derive(Parser, Debug)]
#[command(name = "statetrail")]
#[command(version)]
#[command(about = "A state-graph crawler for web applications", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the run that would be crawled
    #[arg(long, conflicts_with_all = ["stats", "export_graph", "report", "generate_test"])]
    dry_run: bool,

    /// Show statistics of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_graph", "report", "generate_test"])]
    stats: bool,

    /// Write the latest run's graph as JSON to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats", "report", "generate_test"])]
    export_graph: Option<PathBuf>,

    /// Write a markdown report of the latest run's flows and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_graph", "generate_test"])]
    report: bool,

    /// Print a Playwright test skeleton for a flow and exit
    #[arg(long, value_name = "FLOW_ID", conflicts_with_all = ["dry_run", "stats", "export_graph", "report"])]
    generate_test: Option<i64>,

    /// Stream the run's live events to stdout as JSON lines
    #[arg(long)]
    events: bool,

    /// Skip flow mining after the crawl
    #[arg(long)]
    no_flows: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_graph {
        handle_export_graph(&config, path)?;
    } else if cli.report {
        handle_report(&config)?;
    } else if let Some(flow_id) = cli.generate_test {
        handle_generate_test(&config, flow_id)?;
    } else {
        handle_crawl(config, config_hash, cli.events, !cli.no_flows).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("statetrail=info,warn"),
            1 => EnvFilter::new("statetrail=debug,info"),
            2 => EnvFilter::new("statetrail=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout is reserved for event lines and command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_shared_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open {}", config.output.database_path))?;
    Ok(shared(storage))
}

fn latest_run(storage: &dyn Storage) -> anyhow::Result<RunRecord> {
    match storage.get_latest_run()? {
        Some(run) => Ok(run),
        None => bail!("no crawl runs found in database"),
    }
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== StateTrail Dry Run ===\n");

    let run = &config.run;
    println!("Run:");
    println!("  Project: {}", run.project);
    println!("  Start URL: {}", run.start_url);
    println!("  Strategy: {}", run.strategy.as_str());
    println!(
        "  Auth context: {}",
        run.auth_context.as_deref().unwrap_or("anonymous")
    );
    if let Some(state) = &run.storage_state {
        println!("  Storage state: {}", state);
    }
    if run.login_script.is_some() {
        println!("  Login script: yes");
    }

    println!("\nBudget:");
    println!("  Max nodes: {}", run.budget.max_nodes);
    println!("  Max edges: {}", run.budget.max_edges);
    println!("  Max depth: {}", run.budget.max_depth);
    println!("  Max minutes: {}", run.budget.max_minutes);

    println!("\nAllowlist:");
    if run.allowlist.is_unrestricted() {
        println!("  (unrestricted)");
    }
    for domain in &run.allowlist.domains {
        println!("  + domain {}", domain);
    }
    for prefix in &run.allowlist.path_prefixes {
        println!("  + path {}", prefix);
    }
    for prefix in &run.allowlist.deny {
        println!("  - path {}", prefix);
    }

    println!("\nFetching:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    if run.strategy.is_browser() {
        println!("  Headless: {}", config.browser.headless);
        println!(
            "  Viewport: {}x{}",
            config.browser.viewport_width, config.browser.viewport_height
        );
        println!(
            "  Navigation timeout: {}ms",
            config.browser.navigation_timeout_ms
        );
        println!("  Max explored links: {}", config.exploration.max_links);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Evidence: {}", config.output.evidence_dir);
    if let Some(report) = &config.output.report_path {
        println!("  Report: {}", report);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics of the latest run
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_shared_storage(config)?;
    let storage = lock(&storage)?;
    let run = latest_run(&*storage)?;
    let stats = load_statistics(&*storage, &run)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-graph mode: writes the latest run's graph
fn handle_export_graph(config: &Config, path: &Path) -> anyhow::Result<()> {
    let evidence = FsEvidenceStore::new(&config.output.evidence_dir);
    let storage = open_shared_storage(config)?;
    let storage = lock(&storage)?;
    let run = latest_run(&*storage)?;

    let graph = export_graph(&*storage, &evidence, &run)?;
    write_graph(&graph, path).with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "✓ Graph of run {} ({} nodes, {} edges) exported to: {}",
        run.id,
        graph.nodes.len(),
        graph.edges.len(),
        path.display()
    );
    Ok(())
}

/// Handles the --report mode: writes the latest run's flow report
fn handle_report(config: &Config) -> anyhow::Result<()> {
    let storage = open_shared_storage(config)?;
    let storage = lock(&storage)?;
    let run = latest_run(&*storage)?;

    let path = report_path(config);
    write_flow_report(&*storage, &run, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✓ Flow report exported to: {}", path.display());
    Ok(())
}

/// Handles the --generate-test mode: prints a test skeleton for a flow
fn handle_generate_test(config: &Config, flow_id: i64) -> anyhow::Result<()> {
    let storage = open_shared_storage(config)?;
    let storage = lock(&storage)?;
    let code = generate_test(&*storage, flow_id)
        .with_context(|| format!("failed to generate a test for flow {}", flow_id))?;
    print!("{}", code);
    Ok(())
}

fn report_path(config: &Config) -> PathBuf {
    PathBuf::from(
        config
            .output
            .report_path
            .as_deref()
            .unwrap_or(DEFAULT_REPORT_PATH),
    )
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    stream_events: bool,
    mine_flows: bool,
) -> anyhow::Result<()> {
    let storage = open_shared_storage(&config)?;
    let evidence: Arc<dyn EvidenceStore> =
        Arc::new(FsEvidenceStore::new(&config.output.evidence_dir));
    let events = Arc::new(EventHub::new());

    let run_id = Coordinator::queue_run(&config, &storage, Some(config_hash))?;
    tracing::info!(
        "Crawling {} with strategy {} (run {})",
        config.run.start_url,
        config.run.strategy.as_str(),
        run_id
    );

    let printer = stream_events.then(|| {
        let mut rx = events.subscribe(run_id);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to encode {} event: {}", event.kind(), e),
                }
            }
        })
    });

    let config = Arc::new(config);
    let coordinator = Coordinator::new(
        config.clone(),
        storage.clone(),
        evidence,
        events.clone(),
        run_id,
    );
    let outcome = spawn_crawl(coordinator)
        .await
        .context("crawl task panicked")??;

    // The crawl task has released its handle; dropping ours ends the stream
    drop(events);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if outcome.status != RunStatus::Succeeded {
        bail!(
            "run {} failed: {}",
            outcome.run_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let stats = outcome.stats;
    tracing::info!(
        "Crawl completed: {} nodes, {} edges, {} visited, {} errors",
        stats.nodes,
        stats.edges,
        stats.visited,
        stats.errors
    );

    let mut storage = lock(&storage)?;
    let run = storage.get_run(run_id)?;

    if mine_flows {
        let mut flows = mine_smoke_flows(&*storage, &run, SMOKE_FLOWS)?;
        flows.extend(mine_edge_coverage_flows(&*storage, &run)?);
        let saved = save_flows(&mut *storage, &flows)?;
        tracing::info!("Saved {} flows for run {}", saved.len(), run_id);
    }

    if config.output.report_path.is_some() {
        let path = report_path(&config);
        write_flow_report(&*storage, &run, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Flow report written to {}", path.display());
    }

    Ok(())
}
