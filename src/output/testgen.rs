//! Playwright test skeletons
//!
//! Turns a flow into a test that opens the run's start URL and replays each
//! step: navigations become `page.goto`, clicks with a recorded locator
//! become locator clicks.

use crate::output::OutputResult;
use crate::state::ActionType;
use crate::storage::{FlowRecord, LinkRecord, PageRecord, Storage};
use std::collections::HashMap;

/// Generates the skeleton for a stored flow
///
/// # Arguments
///
/// * `storage` - Storage holding the flow and its run's graph
/// * `flow_id` - The flow to turn into a test
///
/// # Returns
///
/// * `Ok(String)` - TypeScript source of the test
/// * `Err(OutputError)` - The flow or its run could not be loaded
pub fn generate_test(storage: &dyn Storage, flow_id: i64) -> OutputResult<String> {
    let flow = storage.get_flow(flow_id)?;
    let run = storage.get_run(flow.run_id)?;
    let pages = storage.list_pages(run.id)?;
    let links = storage.list_links(run.id)?;
    Ok(render_test(&flow, &run.start_url, &pages, &links))
}

fn render_test(
    flow: &FlowRecord,
    start_url: &str,
    pages: &[PageRecord],
    links: &[LinkRecord],
) -> String {
    let urls: HashMap<i64, &str> = pages.iter().map(|p| (p.id, p.url.as_str())).collect();
    let links_by_id: HashMap<i64, &LinkRecord> = links.iter().map(|l| (l.id, l)).collect();

    let mut code = String::new();
    code.push_str("import { test, expect } from '@playwright/test';\n\n");
    code.push_str(&format!(
        "test({}, async ({{ page }}) => {{\n",
        js_string(&flow.name)
    ));
    code.push_str(&format!("  await page.goto({});\n", js_string(start_url)));

    for (i, edge_id) in flow.steps.iter().enumerate() {
        let Some(link) = links_by_id.get(edge_id) else {
            code.push_str(&format!("\n  // step {}: edge {} no longer exists\n", i + 1, edge_id));
            continue;
        };
        let target = urls.get(&link.to_page_id).copied().unwrap_or_default();

        code.push_str(&format!("\n  // step {}: {}", i + 1, link.action_type));
        if let Some(anchor) = &link.anchor_text {
            code.push_str(&format!(" \"{}\"", anchor.replace('\n', " ")));
        }
        code.push('\n');

        match (link.action_type, link.locator.as_deref()) {
            (ActionType::Click, Some(locator)) => {
                code.push_str(&format!(
                    "  await page.locator({}).first().click();\n",
                    js_string(locator)
                ));
            }
            _ => {
                code.push_str(&format!("  await page.goto({});\n", js_string(target)));
            }
        }
        code.push_str(&format!("  await expect(page).toHaveURL({});\n", js_string(target)));
    }

    code.push_str("});\n");
    code
}

/// Single-quoted TypeScript string literal
fn js_string(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{}'", escaped)
}
