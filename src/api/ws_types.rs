use serde_json::Value;

use crate::alerts::WatchSet;

pub use crate::alerts::ServerMessage;

/// Messages a subscriber may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `{"watch": [...], "since_seq": N}`; `since_seq` requests replay.
    Watch { watch: WatchSet, since_seq: Option<u64> },
    Ping,
    Pong,
}

impl ClientMessage {
    /// Accepts `{watch:[..]}`, `{type:"ping"}`, `{"ping":..}` and the pong
    /// equivalents.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
        let obj = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        if let Some(watch) = obj.get("watch") {
            let watch = WatchSet::from_json(watch)?;
            let since_seq = match obj.get("since_seq") {
                None | Some(Value::Null) => None,
                Some(v) => Some(v.as_u64().ok_or_else(|| "since_seq must be a non-negative integer".to_string())?),
            };
            return Ok(ClientMessage::Watch { watch, since_seq });
        }

        match obj.get("type").and_then(Value::as_str) {
            Some("ping") => return Ok(ClientMessage::Ping),
            Some("pong") => return Ok(ClientMessage::Pong),
            _ => {}
        }

        if obj.contains_key("ping") {
            Ok(ClientMessage::Ping)
        } else if obj.contains_key("pong") {
            Ok(ClientMessage::Pong)
        } else {
            Err("unrecognized message".into())
        }
    }
}
