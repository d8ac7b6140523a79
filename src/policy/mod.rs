//! Run policy value objects
//!
//! A crawl run is constrained by three policies, each derived once when the
//! run starts and immutable afterwards:
//!
//! - [`AllowlistRules`] decides which discovered URLs may enter the graph
//! - [`CrawlBudget`] caps nodes, edges, depth and wall-clock time
//! - [`CrawlStrategy`] selects frontier ordering and fetch mode

mod allowlist;
mod budget;
mod strategy;

pub use allowlist::AllowlistRules;
pub use budget::{BudgetTracker, CrawlBudget};
pub use strategy::CrawlStrategy;
