//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunStatus`: Lifecycle of a crawl run (queued, running, succeeded, failed)
//! - `ActionType`: Kind of transition an edge records
//! - `GraphState`: Run-local dedup maps owned by the orchestrator
//! - `UiSignature`: Structured summary of a page's interactive surface

mod action;
mod graph_state;
mod run_status;
mod ui_signature;

// Re-export main types
pub use action::ActionType;
pub use graph_state::GraphState;
pub use run_status::{FinishedReason, RunStats, RunStatus};
pub use ui_signature::{
    Cta, FormDescriptor, FormField, NavElement, NavLink, RiskTags, SignatureMetadata,
    SignatureSummary, UiSignature, ViewportSize,
};
