use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::EntryId;
use crate::remote::{RemoteItem, RemotePatch};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has neither `type` nor `event`")]
    MissingDiscriminator,

    #[error("invalid payload for `{event}`: {reason}")]
    BadPayload { event: String, reason: String },
}

/// Messages the client sends over the realtime socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Ping,
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Business events pushed by the server.
#[derive(Debug, Clone)]
pub enum PushEvent {
    NewItem(RemoteItem),
    UpdateItem(RemotePatch),
    DeleteItem(EntryId),
    Sync,
    /// Discriminator this client does not understand.
    Unknown(String),
}

impl PushEvent {
    pub fn name(&self) -> &str {
        match self {
            PushEvent::NewItem(_) => "new_item",
            PushEvent::UpdateItem(_) => "update_item",
            PushEvent::DeleteItem(_) => "delete_item",
            PushEvent::Sync => "sync",
            PushEvent::Unknown(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Heartbeat reply; consumed by the channel, never forwarded.
    Pong,
    Event(PushEvent),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Decode one text frame.
///
/// `{"type":"pong"}` or `{"event":<name>,"data":<payload>}`.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let frame: RawFrame = serde_json::from_str(text)?;

    if let Some(kind) = frame.kind.as_deref() {
        if kind.eq_ignore_ascii_case("pong") {
            return Ok(InboundMessage::Pong);
        }
        if frame.event.is_none() {
            return Ok(InboundMessage::Event(PushEvent::Unknown(kind.to_string())));
        }
    }

    let event = frame.event.ok_or(ProtocolError::MissingDiscriminator)?;
    let bad_payload = |reason: String| ProtocolError::BadPayload {
        event: event.clone(),
        reason,
    };

    let push = match event.as_str() {
        "new_item" | "item_created" => PushEvent::NewItem(
            serde_json::from_value(frame.data).map_err(|e| bad_payload(e.to_string()))?,
        ),
        "update_item" | "item_updated" => PushEvent::UpdateItem(
            serde_json::from_value(frame.data).map_err(|e| bad_payload(e.to_string()))?,
        ),
        "delete_item" | "item_deleted" => {
            PushEvent::DeleteItem(delete_target(&frame.data).ok_or_else(|| {
                bad_payload(format!("no id in {}", frame.data))
            })?)
        }
        "sync" => PushEvent::Sync,
        other => PushEvent::Unknown(other.to_string()),
    };

    Ok(InboundMessage::Event(push))
}

fn delete_target(data: &Value) -> Option<EntryId> {
    match data {
        Value::String(id) if !id.is_empty() => Some(EntryId::from(id.as_str())),
        Value::Number(n) => Some(EntryId::from(n.to_string())),
        Value::Object(map) => map.get("id").and_then(delete_target),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_serializes_with_type_tag() {
        assert_eq!(OutboundMessage::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn pong_is_not_an_event() {
        assert!(matches!(
            decode_inbound(r#"{"type":"pong"}"#).unwrap(),
            InboundMessage::Pong
        ));
    }

    #[test]
    fn item_created_maps_to_new_item() {
        let frame = r#"{"event":"item_created","data":{"id":5,"content_type":"text","content":"x","created_at":"2024-01-01T00:00:00Z"}}"#;
        match decode_inbound(frame).unwrap() {
            InboundMessage::Event(PushEvent::NewItem(item)) => assert_eq!(item.id.as_str(), "5"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delete_accepts_every_id_shape() {
        for frame in [
            r#"{"event":"delete_item","data":"9"}"#,
            r#"{"event":"delete_item","data":9}"#,
            r#"{"event":"delete_item","data":{"id":9}}"#,
        ] {
            match decode_inbound(frame).unwrap() {
                InboundMessage::Event(PushEvent::DeleteItem(id)) => assert_eq!(id.as_str(), "9"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_and_malformed_frames() {
        match decode_inbound(r#"{"event":"party","data":{}}"#).unwrap() {
            InboundMessage::Event(PushEvent::Unknown(name)) => assert_eq!(name, "party"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decode_inbound("not json").is_err());
        assert!(matches!(
            decode_inbound(r#"{"data":1}"#),
            Err(ProtocolError::MissingDiscriminator)
        ));
        assert!(decode_inbound(r#"{"event":"delete_item","data":null}"#).is_err());
    }
}
