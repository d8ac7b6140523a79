//! Markdown flow report generation
//!
//! This module generates a human-readable report of a run and the flows
//! mined from it, spelling out every step of every flow.

use crate::flows::page_label;
use crate::output::OutputResult;
use crate::storage::{FlowRecord, LinkRecord, PageRecord, RunRecord, Storage};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the flow report of a run
///
/// # Arguments
///
/// * `storage` - Storage holding the run's graph and flows
/// * `run` - The run to report on
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to load data or write the file
pub fn write_flow_report(
    storage: &dyn Storage,
    run: &RunRecord,
    output_path: &Path,
) -> OutputResult<()> {
    let pages = storage.list_pages(run.id)?;
    let links = storage.list_links(run.id)?;
    let flows = storage.list_flows(run.id)?;
    let markdown = format_flow_report(run, &pages, &links, &flows);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run and its flows as markdown
pub fn format_flow_report(
    run: &RunRecord,
    pages: &[PageRecord],
    links: &[LinkRecord],
    flows: &[FlowRecord],
) -> String {
    let pages_by_id: HashMap<i64, &PageRecord> = pages.iter().map(|p| (p.id, p)).collect();
    let links_by_id: HashMap<i64, &LinkRecord> = links.iter().map(|l| (l.id, l)).collect();
    let label = |id: i64| {
        pages_by_id
            .get(&id)
            .map(|p| page_label(p))
            .unwrap_or_else(|| format!("page {}", id))
    };

    let mut md = String::new();

    md.push_str("# StateTrail Flow Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", run.id));
    md.push_str(&format!("- **Project**: {}\n", run.project));
    if let Some(auth) = &run.auth_context {
        md.push_str(&format!("- **Auth Context**: {}\n", auth));
    }
    md.push_str(&format!("- **Start URL**: {}\n", run.start_url));
    md.push_str(&format!("- **Strategy**: {}\n", run.strategy.as_str()));
    md.push_str(&format!("- **Status**: {}\n", run.status));
    if let Some(reason) = run.stats.finished_reason {
        md.push_str(&format!("- **Finished Reason**: {}\n", reason));
    }
    if let Some(error) = &run.error_message {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    md.push_str("## Graph\n\n");
    md.push_str(&format!("- **Nodes**: {}\n", pages.len()));
    md.push_str(&format!("- **Edges**: {}\n", links.len()));
    md.push_str(&format!("- **Visited**: {}\n", run.stats.visited));
    md.push_str(&format!("- **Errors**: {}\n\n", run.stats.errors));

    md.push_str(&format!("## Flows ({})\n\n", flows.len()));
    if flows.is_empty() {
        md.push_str("No flows were mined for this run.\n");
        return md;
    }

    for flow in flows {
        md.push_str(&format!("### {}\n\n", flow.name));
        md.push_str(&format!(
            "- **ID**: {}\n- **Source**: {}\n- **Steps**: {}\n\n",
            flow.id,
            flow.source,
            flow.steps.len()
        ));

        md.push_str("| # | Action | From | To | Anchor |\n");
        md.push_str("|---|--------|------|----|--------|\n");
        for (i, edge_id) in flow.steps.iter().enumerate() {
            match links_by_id.get(edge_id) {
                Some(link) => md.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    i + 1,
                    link.action_type,
                    escape_cell(&label(link.from_page_id)),
                    escape_cell(&label(link.to_page_id)),
                    escape_cell(link.anchor_text.as_deref().unwrap_or(""))
                )),
                None => md.push_str(&format!(
                    "| {} | ? | edge {} not found | | |\n",
                    i + 1,
                    edge_id
                )),
            }
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
