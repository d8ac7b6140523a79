//! Browser-driven fetching
//!
//! A [`BrowserSession`] renders pages in headless Chromium, captures their
//! UI signature, screenshot and network requests, and explores pages that
//! expose no static links by executing ranked UI actions.
//!
//! Ranking and state-change detection sit behind the [`ActionRanker`] and
//! [`StateChangeDetector`] traits so other heuristics can be plugged in with
//! [`BrowserSession::with_heuristics`].

mod detector;
mod explore;
mod ranker;
mod scripts;
mod session;

pub use detector::{HeuristicStateChangeDetector, Observation, StateChange, StateChangeDetector};
pub use ranker::{
    select_for_execution, ActionCandidate, ActionKind, ActionRanker, KeywordActionRanker,
};
pub use session::BrowserSession;
