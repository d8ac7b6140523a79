//! Graph export
//!
//! Serializes a run's nodes and edges into the JSON document graph viewers
//! consume. Node evidence keys are turned into URLs through the evidence
//! store.

use crate::output::OutputResult;
use crate::state::{ActionType, RiskTags, SignatureSummary};
use crate::storage::{EvidenceStore, LinkRecord, PageRecord, RunRecord, Storage};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphExport {
    pub run_id: i64,
    pub start_url: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: i64,
    pub node_key: String,
    pub url: String,
    pub url_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    pub has_network_log: bool,
    pub summary: SignatureSummary,
    pub risk_tags: RiskTags,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: i64,
    pub from: i64,
    pub to: i64,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub risk_tags: RiskTags,
}

impl GraphNode {
    fn from_page(page: PageRecord, evidence: &dyn EvidenceStore) -> Self {
        // A missing URL only hides the thumbnail
        let screenshot_url = page.screenshot_key.as_deref().and_then(|key| {
            evidence
                .presigned_url(key)
                .map_err(|e| debug!("No URL for screenshot {}: {}", key, e))
                .ok()
        });
        let (summary, risk_tags) = match &page.ui_signature {
            Some(signature) => (signature.summary(), signature.risk_tags()),
            None => Default::default(),
        };

        Self {
            id: page.id,
            node_key: page.node_key,
            url: page.url,
            url_pattern: page.url_pattern,
            title: page.title,
            depth: page.depth,
            http_status: page.http_status,
            content_type: page.content_type,
            screenshot_url,
            has_network_log: page.network_log_key.is_some(),
            summary,
            risk_tags,
        }
    }
}

impl From<LinkRecord> for GraphEdge {
    fn from(link: LinkRecord) -> Self {
        Self {
            id: link.id,
            from: link.from_page_id,
            to: link.to_page_id,
            action_type: link.action_type,
            anchor_text: link.anchor_text,
            locator: link.locator,
            risk_tags: link.risk_tags,
        }
    }
}

/// Builds the graph document of a run
///
/// # Arguments
///
/// * `storage` - Storage holding the run's graph
/// * `evidence` - Store used to resolve screenshot URLs
/// * `run` - The run to export
pub fn export_graph(
    storage: &dyn Storage,
    evidence: &dyn EvidenceStore,
    run: &RunRecord,
) -> OutputResult<GraphExport> {
    let nodes = storage
        .list_pages(run.id)?
        .into_iter()
        .map(|page| GraphNode::from_page(page, evidence))
        .collect();
    let edges = storage
        .list_links(run.id)?
        .into_iter()
        .map(GraphEdge::from)
        .collect();

    Ok(GraphExport {
        run_id: run.id,
        start_url: run.start_url.clone(),
        nodes,
        edges,
    })
}

/// Writes a graph document as pretty-printed JSON
pub fn write_graph(graph: &GraphExport, output_path: &Path) -> OutputResult<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), graph)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowlistRules, CrawlBudget, CrawlStrategy};
    use crate::state::{Cta, FormDescriptor, FormField, UiSignature};
    use crate::storage::{FsEvidenceStore, NewLink, NewRun, PageEvidence, SqliteStorage};
    use tempfile::TempDir;

    #[test]
    fn test_export_graph() {
        let dir = TempDir::new().unwrap();
        let evidence = FsEvidenceStore::new(dir.path());
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage
            .create_run(&NewRun {
                project: "demo".to_string(),
                auth_context: None,
                start_url: "https://a.test/".to_string(),
                strategy: CrawlStrategy::BrowserBfs,
                budget: CrawlBudget::default(),
                allowlist: AllowlistRules::default(),
                config_hash: None,
            })
            .unwrap();

        let (root, _) = storage
            .get_or_create_page(run_id, "https://a.test/", 0, "k0", "https://a.test/")
            .unwrap();
        let (child, _) = storage
            .get_or_create_page(run_id, "https://a.test/b", 1, "k1", "https://a.test/b")
            .unwrap();

        let key = evidence.save_screenshot(run_id, root.id, b"png").unwrap();
        let signature = UiSignature {
            dom_hash: "1,0".to_string(),
            ctas: vec![Cta {
                text: "Sign up".to_string(),
                ..Default::default()
            }],
            forms: vec![FormDescriptor {
                fields: vec![FormField {
                    kind: "email".to_string(),
                    required: true,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        storage
            .attach_page_evidence(
                root.id,
                &PageEvidence {
                    ui_signature: Some(signature),
                    screenshot_key: Some(key),
                    ..Default::default()
                },
            )
            .unwrap();
        storage
            .insert_link(
                run_id,
                &NewLink {
                    from_page_id: root.id,
                    to_page_id: child.id,
                    action_type: ActionType::Click,
                    locator: Some("button.cta".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let run = storage.get_run(run_id).unwrap();
        let graph = export_graph(&storage, &evidence, &run).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);

        let node = graph.nodes.iter().find(|n| n.id == root.id).unwrap();
        assert!(node.screenshot_url.as_deref().unwrap().starts_with("file://"));
        assert_eq!(node.summary.cta_texts, vec!["Sign up".to_string()]);
        assert!(node.risk_tags.has_forms && node.risk_tags.has_required_fields);

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["edges"][0]["actionType"], "CLICK");
        assert_eq!(json["edges"][0]["locator"], "button.cta");

        let path = dir.path().join("graph.json");
        write_graph(&graph, &path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["runId"], run_id);
    }
}
