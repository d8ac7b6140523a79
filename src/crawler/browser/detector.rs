use crate::state::UiSignature;

/// What the page looked like at one point during exploration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub url: String,
    pub dom_hash: String,
    pub cta_count: usize,
    /// An accordion/menu panel tied to the clicked element is open
    pub panel_expanded: bool,
    /// Link-bearing items inside that panel
    pub revealed_items: usize,
}

impl Observation {
    /// Observation of a page with no panel information
    pub fn from_signature(url: impl Into<String>, signature: &UiSignature) -> Self {
        Self {
            url: url.into(),
            dom_hash: signature.dom_hash.clone(),
            cta_count: signature.cta_count(),
            panel_expanded: false,
            revealed_items: 0,
        }
    }

    pub fn with_panel(mut self, expanded: bool, items: usize) -> Self {
        self.panel_expanded = expanded;
        self.revealed_items = items;
        self
    }
}

/// Result of comparing two observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChange {
    pub url_changed: bool,
    pub dom_hash_changed: bool,
    pub cta_count_changed: bool,
    pub panel_expanded: bool,
    pub revealed_items: usize,
}

impl StateChange {
    pub fn changed(&self) -> bool {
        self.url_changed
            || self.dom_hash_changed
            || self.cta_count_changed
            || self.panel_expanded
            || self.revealed_items > 0
    }
}

/// Decides whether an action moved the page into a new state
pub trait StateChangeDetector: Send + Sync {
    fn detect(&self, before: &Observation, after: &Observation) -> StateChange;
}

/// Flags any URL, structure, CTA count or panel change
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStateChangeDetector;

impl StateChangeDetector for HeuristicStateChangeDetector {
    fn detect(&self, before: &Observation, after: &Observation) -> StateChange {
        StateChange {
            url_changed: before.url != after.url,
            dom_hash_changed: before.dom_hash != after.dom_hash,
            cta_count_changed: before.cta_count != after.cta_count,
            panel_expanded: after.panel_expanded,
            revealed_items: after.revealed_items,
        }
    }
}
