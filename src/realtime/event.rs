use serde::{Deserialize, Serialize};

use crate::AppError;

/// Body of both `send-message` and `new-message`. Fields default to empty so that a frame
/// missing one of them reaches validation rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub text: String,
}

impl MessagePayload {
    pub fn new(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into(), text: text.into() }
    }
}

/// Frames a client may send: `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    SendMessage(MessagePayload),
}

/// Frames the server pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewMessage(MessagePayload),
    Error { kind: String, message: String },
}

impl ServerEvent {
    pub fn error(err: &AppError) -> Self {
        ServerEvent::Error { kind: err.kind().to_owned(), message: err.to_string() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_send_message() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send-message",
            "data": { "from": "alice", "to": "bob", "text": "hi" }
        }))
        .unwrap();
        assert_eq!(event, ClientEvent::SendMessage(MessagePayload::new("alice", "bob", "hi")));
    }

    #[test]
    fn missing_fields_parse_as_empty() {
        let ClientEvent::SendMessage(payload) = serde_json::from_value(json!({
            "event": "send-message",
            "data": { "from": "alice" }
        }))
        .unwrap();
        assert_eq!(payload.to, "");
        assert_eq!(payload.text, "");
    }

    #[test]
    fn unknown_event_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({ "event": "typing", "data": {} }));
        assert!(parsed.is_err());
    }

    #[test]
    fn new_message_wire_shape() {
        let event = ServerEvent::NewMessage(MessagePayload::new("alice", "bob", "hi"));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "event": "new-message", "data": { "from": "alice", "to": "bob", "text": "hi" } })
        );
    }

    #[test]
    fn error_wire_shape() {
        let event = ServerEvent::error(&AppError::validation("text is required"));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "error",
                "data": { "kind": "validation", "message": "validation failed: text is required" }
            })
        );
    }
}
