//! Action-based exploration for pages without static links
//!
//! Candidates come from the page's CTAs, ranked by an [`ActionRanker`]. Each
//! one is executed, the page is re-sampled, and a [`StateChangeDetector`]
//! decides whether the action revealed anything. Links harvested from a
//! changed state are attributed to the action as `CLICK` transitions.
//!
//! [`ActionRanker`]: super::ActionRanker
//! [`StateChangeDetector`]: super::StateChangeDetector

use super::detector::Observation;
use super::ranker::{select_for_execution, ActionCandidate, ActionKind};
use super::scripts;
use super::session::BrowserSession;
use crate::crawler::parser::{parse_html, truncate_chars, MAX_ANCHOR_CHARS};
use crate::crawler::DiscoveredLink;
use crate::state::UiSignature;
use crate::url::normalize_link;
use crate::StateTrailError;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};
use url::Url;

const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// Link as returned by the panel scripts
#[derive(Debug, Deserialize)]
struct ScriptLink {
    url: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelProbe {
    expanded: bool,
    items: usize,
}

/// Deduplicating link accumulator with a soft cap
#[derive(Debug)]
pub(super) struct LinkCollector {
    seen: HashSet<String>,
    links: Vec<DiscoveredLink>,
    limit: usize,
}

impl LinkCollector {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            links: Vec::new(),
            limit,
        }
    }

    /// Adds a link regardless of the cap; duplicates are ignored
    pub(super) fn push(&mut self, link: DiscoveredLink) -> bool {
        if self.seen.insert(link.url.clone()) {
            self.links.push(link);
            true
        } else {
            false
        }
    }

    /// Adds links until the cap is reached
    pub(super) fn extend(&mut self, links: impl IntoIterator<Item = DiscoveredLink>) {
        for link in links {
            if self.is_full() {
                break;
            }
            self.push(link);
        }
    }

    pub(super) fn is_full(&self) -> bool {
        self.links.len() >= self.limit
    }

    pub(super) fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(super) fn into_links(self) -> Vec<DiscoveredLink> {
        self.links
    }
}

/// Turns a link found after `candidate` into a click transition
fn attribute(link: DiscoveredLink, candidate: &ActionCandidate) -> DiscoveredLink {
    let anchor_text = link.anchor_text.or_else(|| non_empty(&candidate.text));
    DiscoveredLink::click(link.url, anchor_text, non_empty(&candidate.selector))
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| truncate_chars(trimmed, MAX_ANCHOR_CHARS))
}

impl BrowserSession {
    /// Explores the UI of the current page and returns the links it revealed
    pub(super) async fn explore(&self, page_url: &Url, signature: &UiSignature) -> Vec<DiscoveredLink> {
        let candidates = select_for_execution(self.ranker.rank(signature));
        info!(
            "No static links on {}, exploring {} UI actions",
            page_url,
            candidates.len()
        );

        let before = Observation::from_signature(page_url.as_str(), signature);
        let mut collector = LinkCollector::new(self.exploration.max_links);

        for candidate in &candidates {
            if collector.is_full() {
                break;
            }
            match self.try_action(candidate, &before, page_url).await {
                Ok(found) => {
                    debug!(
                        "Action {:?} revealed {} links",
                        candidate.text,
                        found.len()
                    );
                    collector.extend(found);
                }
                Err(e) => debug!("Action {:?} failed: {}", candidate.text, e),
            }
        }

        if !collector.is_empty() {
            if let Ok(html) = self.page.content().await {
                let current = self.current_url(page_url).await;
                for link in parse_html(&html, &current).links {
                    collector.push(link);
                }
            }
        }

        let links = collector.into_links();
        info!("Exploration of {} found {} links", page_url, links.len());
        links
    }

    /// Executes one candidate and harvests links if the state changed
    async fn try_action(
        &self,
        candidate: &ActionCandidate,
        before: &Observation,
        page_url: &Url,
    ) -> Result<Vec<DiscoveredLink>, StateTrailError> {
        let click_timeout = Duration::from_millis(self.exploration.click_timeout_ms);

        let acted = match (candidate.kind, candidate.href.as_deref()) {
            (ActionKind::Navigate, Some(href)) => match normalize_link(page_url, href) {
                Some(target) => self.navigate(&target, click_timeout).await.is_ok(),
                None => false,
            },
            _ => self.click(&candidate.text).await,
        };
        if !acted {
            return Ok(Vec::new());
        }

        self.settle().await;

        let probe = if candidate.kind == ActionKind::Click {
            self.probe_panel(&candidate.text).await
        } else {
            PanelProbe::default()
        };
        let after_url = self.current_url(page_url).await;
        let after_signature = self.signature().await?;
        let after = Observation::from_signature(after_url.as_str(), &after_signature)
            .with_panel(probe.expanded, probe.items);

        let change = self.detector.detect(before, &after);
        debug!(
            "State check for {:?}: url={} dom={} ctas={} panel={} items={}",
            candidate.text,
            change.url_changed,
            change.dom_hash_changed,
            change.cta_count_changed,
            change.panel_expanded,
            change.revealed_items
        );
        if !change.changed() {
            return Ok(Vec::new());
        }

        let mut found: Vec<DiscoveredLink> = Vec::new();
        let html = self.page.content().await?;
        found.extend(
            parse_html(&html, &after_url)
                .links
                .into_iter()
                .map(|link| attribute(link, candidate)),
        );

        if change.panel_expanded || change.revealed_items > 0 {
            let panel = self
                .scripted_links(&scripts::panel_links(&candidate.text), &after_url)
                .await;
            if panel.is_empty() {
                found.extend(
                    self.scripted_links(&scripts::aggressive_links(&candidate.text), &after_url)
                        .await
                        .into_iter()
                        .map(|link| attribute(link, candidate)),
                );
            } else {
                found.extend(panel.into_iter().map(|link| attribute(link, candidate)));
            }
        }

        if after.cta_count > before.cta_count {
            for cta in &after_signature.ctas {
                let Some(href) = cta.href.as_deref().filter(|h| !h.trim().is_empty()) else {
                    continue;
                };
                if let Some(target) = normalize_link(&after_url, href) {
                    let link = DiscoveredLink::navigate(target.to_string(), non_empty(&cta.text));
                    found.push(attribute(link, candidate));
                }
            }
        }

        // Later candidates expect the original page
        if change.url_changed {
            if let Err(e) = self.navigate(page_url, self.navigation_timeout()).await {
                debug!("Could not return to {}: {}", page_url, e);
            }
            self.settle().await;
        }

        Ok(found)
    }

    /// Role-based click on a visible button, falling back to a script click
    async fn click(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        match self.click_by_role(text).await {
            Ok(true) => return true,
            Ok(false) => debug!("No visible button named {:?}, using script click", text),
            Err(e) => debug!("Role click on {:?} failed: {}", text, e),
        }

        let script = scripts::click_by_text(text);
        match self.page.evaluate(script.as_str()).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!("Script click on {:?} failed: {}", text, e);
                false
            }
        }
    }

    async fn click_by_role(&self, text: &str) -> Result<bool, StateTrailError> {
        let mark = scripts::mark_button_by_role(text);
        let visible_by = Instant::now() + Duration::from_millis(self.exploration.visible_timeout_ms);

        loop {
            let marked: bool = self.page.evaluate(mark.as_str()).await?.into_value()?;
            if marked {
                break;
            }
            if Instant::now() >= visible_by {
                return Ok(false);
            }
            sleep(VISIBILITY_POLL).await;
        }

        let click = async {
            let element = self.page.find_element(scripts::MARKED_TARGET).await?;
            element.click().await?;
            Ok::<_, StateTrailError>(())
        };
        match timeout(Duration::from_millis(self.exploration.click_timeout_ms), click).await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    /// Short wait, best-effort network idle, short wait
    async fn settle(&self) {
        let wait = Duration::from_millis(self.exploration.settle_wait_ms);
        sleep(wait).await;
        self.wait_for_network_idle(Duration::from_millis(self.exploration.settle_idle_timeout_ms))
            .await;
        sleep(wait).await;
    }

    async fn probe_panel(&self, text: &str) -> PanelProbe {
        let script = scripts::panel_probe(text);
        match self.page.evaluate(script.as_str()).await {
            Ok(result) => result.into_value().unwrap_or_default(),
            Err(e) => {
                debug!("Panel probe for {:?} failed: {}", text, e);
                PanelProbe::default()
            }
        }
    }

    async fn scripted_links(&self, script: &str, base: &Url) -> Vec<DiscoveredLink> {
        let raw: Vec<ScriptLink> = match self.page.evaluate(script).await {
            Ok(result) => result.into_value().unwrap_or_default(),
            Err(e) => {
                debug!("Link script failed: {}", e);
                return Vec::new();
            }
        };
        resolve_script_links(raw, base)
    }
}

fn resolve_script_links(raw: Vec<ScriptLink>, base: &Url) -> Vec<DiscoveredLink> {
    raw.into_iter()
        .filter_map(|link| {
            let url = normalize_link(base, &link.url)?;
            Some(DiscoveredLink::navigate(url.to_string(), non_empty(&link.text)))
        })
        .collect()
}
