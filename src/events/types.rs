use crate::state::{ActionType, RunStats, RunStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A message on a run's live event stream
///
/// Serialized as `{"type": "NODE_CREATED", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    Status(StatusEvent),
    NodeCreated(NodeCreatedEvent),
    EdgeCreated(EdgeCreatedEvent),
    Stats(RunStats),
    Ping { ts: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCreatedEvent {
    pub id: i64,
    pub url: String,
    pub depth: u32,
    pub node_key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCreatedEvent {
    pub id: i64,
    pub from: i64,
    pub to: i64,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub anchor_text: Option<String>,
}

impl RunEvent {
    /// Heartbeat stamped with the current time in epoch milliseconds
    pub fn ping() -> Self {
        Self::Ping {
            ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn running() -> Self {
        Self::Status(StatusEvent {
            status: RunStatus::Running,
            started_at: Some(Utc::now().to_rfc3339()),
            finished_at: None,
            error: None,
        })
    }

    pub fn succeeded() -> Self {
        Self::Status(StatusEvent {
            status: RunStatus::Succeeded,
            started_at: None,
            finished_at: Some(Utc::now().to_rfc3339()),
            error: None,
        })
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Status(StatusEvent {
            status: RunStatus::Failed,
            started_at: None,
            finished_at: None,
            error: Some(error.into()),
        })
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "STATUS",
            Self::NodeCreated(_) => "NODE_CREATED",
            Self::EdgeCreated(_) => "EDGE_CREATED",
            Self::Stats(_) => "STATS",
            Self::Ping { .. } => "PING",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FinishedReason;
    use serde_json::json;

    #[test]
    fn test_node_created_wire_format() {
        let event = RunEvent::NodeCreated(NodeCreatedEvent {
            id: 1,
            url: "https://a.test/".to_string(),
            depth: 0,
            node_key: "k".to_string(),
            title: None,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "NODE_CREATED",
                "data": {"id": 1, "url": "https://a.test/", "depth": 0, "nodeKey": "k"}
            })
        );
    }

    #[test]
    fn test_edge_created_wire_format() {
        let event = RunEvent::EdgeCreated(EdgeCreatedEvent {
            id: 9,
            from: 1,
            to: 2,
            action_type: ActionType::Navigate,
            anchor_text: Some("Next".to_string()),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "EDGE_CREATED",
                "data": {"id": 9, "from": 1, "to": 2, "actionType": "NAVIGATE", "anchorText": "Next"}
            })
        );
    }

    #[test]
    fn test_status_and_stats_wire_format() {
        let value = serde_json::to_value(RunEvent::failed("invalid startUrl")).unwrap();
        assert_eq!(value["type"], "STATUS");
        assert_eq!(value["data"]["status"], "FAILED");
        assert_eq!(value["data"]["error"], "invalid startUrl");
        assert!(value["data"].get("finishedAt").is_none());

        let stats = RunEvent::Stats(RunStats {
            nodes: 1,
            edges: 0,
            errors: 0,
            visited: 1,
            finished_reason: Some(FinishedReason::BudgetOrFrontier),
        });
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["type"], "STATS");
        assert_eq!(value["data"]["finishedReason"], "BUDGET_OR_FRONTIER");
    }

    #[test]
    fn test_ping_and_kind() {
        let ping = RunEvent::ping();
        assert_eq!(ping.kind(), "PING");
        let value = serde_json::to_value(&ping).unwrap();
        assert!(value["data"]["ts"].as_i64().unwrap() > 0);

        assert_eq!(RunEvent::running().kind(), "STATUS");
    }

    #[test]
    fn test_event_deserializes() {
        let event: RunEvent = serde_json::from_value(json!({
            "type": "STATUS",
            "data": {"status": "SUCCEEDED", "finishedAt": "2024-01-01T00:00:00Z"}
        }))
        .unwrap();
        match event {
            RunEvent::Status(status) => assert_eq!(status.status, RunStatus::Succeeded),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
