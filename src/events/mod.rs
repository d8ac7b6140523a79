//! Live progress events
//!
//! A crawl publishes typed events (`STATUS`, `NODE_CREATED`, `EDGE_CREATED`,
//! `STATS`, `PING`) to an [`EventHub`], which fans them out to every
//! subscriber watching that run.

mod hub;
mod types;

pub use hub::EventHub;
pub use types::{EdgeCreatedEvent, NodeCreatedEvent, RunEvent, StatusEvent};
