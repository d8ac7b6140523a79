use crate::state::UiSignature;

/// How a candidate is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Go straight to the candidate's href
    Navigate,
    /// Click the element carrying the candidate's text
    Click,
}

/// A UI element worth interacting with during exploration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCandidate {
    pub kind: ActionKind,
    pub text: String,
    pub selector: String,
    pub href: Option<String>,
    /// 1 = navigation-like, 2 = pagination-like, 3 = generic
    pub priority: u8,
}

/// Orders the CTAs of a page for exploration
pub trait ActionRanker: Send + Sync {
    /// Returns candidates sorted by ascending priority
    fn rank(&self, signature: &UiSignature) -> Vec<ActionCandidate>;
}

const NAVIGATION_SELECTOR_HINTS: &[&str] = &["accordion", "menuitem"];
const NAVIGATION_TEXT_HINTS: &[&str] = &["관리", "menu", "nav"];
const PAGINATION_SELECTOR_HINTS: &[&str] = &["pagination"];
const PAGINATION_WORDS: &[&str] = &["next", "prev", "이전", "다음"];

/// Keyword and class-name heuristics tuned for menu-driven admin UIs
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordActionRanker;

impl KeywordActionRanker {
    /// Priority of an element with the given visible text and selector
    pub fn priority(text: &str, selector: &str) -> u8 {
        let text = text.to_lowercase();
        let selector = selector.to_lowercase();

        if NAVIGATION_SELECTOR_HINTS.iter().any(|h| selector.contains(h))
            || NAVIGATION_TEXT_HINTS.iter().any(|h| text.contains(h))
        {
            1
        } else if PAGINATION_SELECTOR_HINTS.iter().any(|h| selector.contains(h))
            || (!text.is_empty() && text.chars().all(|c| c.is_ascii_digit()))
            || PAGINATION_WORDS.contains(&text.as_str())
        {
            2
        } else {
            3
        }
    }
}

impl ActionRanker for KeywordActionRanker {
    fn rank(&self, signature: &UiSignature) -> Vec<ActionCandidate> {
        let mut candidates: Vec<ActionCandidate> = signature
            .ctas
            .iter()
            .filter(|cta| !(cta.text.trim().is_empty() && cta.selector.trim().is_empty()))
            .map(|cta| ActionCandidate {
                kind: if cta.href.is_some() {
                    ActionKind::Navigate
                } else {
                    ActionKind::Click
                },
                text: cta.text.clone(),
                selector: cta.selector.clone(),
                href: cta.href.clone(),
                priority: Self::priority(&cta.text, &cta.selector),
            })
            .collect();

        // stable: document order is kept within a priority
        candidates.sort_by_key(|c| c.priority);
        candidates
    }
}

/// Candidates to execute: the navigation-like ones, or all if there are none
pub fn select_for_execution(ranked: Vec<ActionCandidate>) -> Vec<ActionCandidate> {
    if ranked.iter().any(|c| c.priority == 1) {
        ranked.into_iter().filter(|c| c.priority == 1).collect()
    } else {
        ranked
    }
}
