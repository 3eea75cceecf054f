use serde::Serialize;

use super::registry::WatchSet;
use crate::models::ScoredResult;

/// Messages sent from the server to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A high-risk result. `seq` increases monotonically per process.
    Tx { seq: u64, item: ScoredResult },
    /// Confirms the active watch filter.
    Ack { watch: WatchSet, dropped_count: u64 },
    Ping,
    Pong,
    Error { message: String },
}

impl ServerMessage {
    /// Everything except alerts travels on the control lane.
    pub fn is_control(&self) -> bool {
        !matches!(self, ServerMessage::Tx { .. })
    }
}
