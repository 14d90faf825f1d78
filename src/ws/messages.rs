//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::LeaderboardView;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client pushed event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands a subscribed client can send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Application-level keepalive; answered with `pong`.
    Ping,
    /// Immediate resend of the current leaderboard for this viewer.
    Status,
    /// Ends the subscription.
    Unsubscribe,
}

impl WsMessage {
    /// Builds a server-pushed leaderboard event.
    #[must_use]
    pub fn leaderboard(view: &LeaderboardView) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "event": "leaderboard",
                "data": view,
            }),
        }
    }

    /// Builds a response to the command with ID `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message.
    #[must_use]
    pub fn error(id: String, code: u32, message: &str) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": code,
                "message": message,
            }),
        }
    }

    /// Serializes the message to JSON text.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Extracts the command carried by a `command` message.
    #[must_use]
    pub fn command(&self) -> Option<WsCommand> {
        if self.msg_type != WsMessageType::Command {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn command_parses_without_timestamp() {
        let text = r#"{"id":"c1","type":"command","payload":{"command":"status"}}"#;
        let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
            panic!("envelope should parse");
        };
        assert_eq!(msg.command(), Some(WsCommand::Status));
        assert_eq!(msg.id, "c1");
    }

    #[test]
    fn unknown_command_is_none() {
        let text = r#"{"id":"c2","type":"command","payload":{"command":"swap"}}"#;
        let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
            panic!("envelope should parse");
        };
        assert!(msg.command().is_none());
    }

    #[test]
    fn error_serializes_type_field() {
        let json = WsMessage::error(String::new(), 400, "malformed JSON")
            .to_json()
            .unwrap_or_default();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("malformed JSON"));
    }
}
