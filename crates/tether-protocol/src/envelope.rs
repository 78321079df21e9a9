//! JSON envelope encoding/decoding
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "type": "ConversationUpdate",
//!   "payload": { "messageId": "m1", "text": "Hel", "partial": true },
//!   "timestamp": 1700000000000,
//!   "id": "frame-42",
//!   "isStreaming": true,
//!   "isFinal": false,
//!   "streamId": "s1",
//!   "chunkIndex": 3
//! }
//! ```
//!
//! Decoding is two-pass: the envelope (including the `type` discriminant)
//! is read first, then the payload is decoded against the shape that
//! discriminant selects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::message::{AgentMessage, MessageKind};

/// Streaming flags carried alongside every frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamInfo {
    /// Whether this frame is part of a streamed logical message
    pub is_streaming: bool,
    /// Whether this frame is the last chunk of its stream
    pub is_final: bool,
    /// Stream identifier, if the server assigned one
    pub stream_id: Option<String>,
    /// Position of this chunk within its stream
    pub chunk_index: Option<u64>,
}

/// A decoded protocol frame
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Frame identifier
    pub id: String,
    /// Server timestamp in Unix milliseconds
    pub timestamp: u64,
    /// The decoded message
    pub message: AgentMessage,
    /// Streaming flags
    pub stream: StreamInfo,
}

/// Raw envelope as it appears on the wire
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    id: String,
    #[serde(flatten)]
    stream: StreamInfo,
}

impl Envelope {
    /// Create an envelope for an outbound message
    pub fn new(id: impl Into<String>, timestamp: u64, message: AgentMessage) -> Self {
        Self {
            id: id.into(),
            timestamp,
            message,
            stream: StreamInfo::default(),
        }
    }

    /// Decode a frame from its JSON text
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let wire: WireEnvelope = serde_json::from_str(text)?;

        let message = match MessageKind::from_str(&wire.kind) {
            Some(MessageKind::ClientHandshake) => AgentMessage::ClientHandshake(
                decode_payload(&wire.kind, wire.payload)?,
            ),
            Some(MessageKind::ConnectionAccepted) => AgentMessage::ConnectionAccepted,
            Some(MessageKind::ConnectionRejected) => AgentMessage::ConnectionRejected {
                reason: wire
                    .payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            Some(MessageKind::Ping) => AgentMessage::Ping,
            Some(MessageKind::Pong) => AgentMessage::Pong,
            Some(MessageKind::ConversationUpdate) => AgentMessage::ConversationUpdate(
                decode_payload(&wire.kind, wire.payload)?,
            ),
            Some(MessageKind::CommandResult) => AgentMessage::CommandResult(
                decode_payload(&wire.kind, wire.payload)?,
            ),
            Some(MessageKind::PermissionRequest) => AgentMessage::PermissionRequest(
                decode_payload(&wire.kind, wire.payload)?,
            ),
            Some(MessageKind::SessionStatus) => AgentMessage::SessionStatus(wire.payload),
            Some(MessageKind::Error) => AgentMessage::Error {
                message: wire
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_owned(),
            },
            None => {
                tracing::trace!("Unrecognized message type {:?}", wire.kind);
                AgentMessage::Unknown {
                    kind: wire.kind,
                    payload: wire.payload,
                }
            }
        };

        Ok(Self {
            id: wire.id,
            timestamp: wire.timestamp,
            message,
            stream: wire.stream,
        })
    }

    /// Encode this frame as JSON text
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let payload = match &self.message {
            AgentMessage::ClientHandshake(p) => serde_json::to_value(p)?,
            AgentMessage::ConnectionAccepted
            | AgentMessage::Ping
            | AgentMessage::Pong => Value::Object(serde_json::Map::new()),
            AgentMessage::ConnectionRejected { reason } => match reason {
                Some(r) => serde_json::json!({ "reason": r }),
                None => Value::Object(serde_json::Map::new()),
            },
            AgentMessage::ConversationUpdate(p)
            | AgentMessage::CommandResult(p)
            | AgentMessage::PermissionRequest(p) => serde_json::to_value(p)?,
            AgentMessage::SessionStatus(v) => v.clone(),
            AgentMessage::Error { message } => serde_json::json!({ "message": message }),
            AgentMessage::Unknown { payload, .. } => payload.clone(),
        };

        let wire = WireEnvelope {
            kind: self.message.kind_str().to_owned(),
            payload,
            timestamp: self.timestamp,
            id: self.id.clone(),
            stream: self.stream.clone(),
        };

        Ok(serde_json::to_string(&wire)?)
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ConversationPayload, HandshakePayload};

    #[test]
    fn test_decode_conversation_update() {
        let text = r#"{
            "type": "ConversationUpdate",
            "payload": {"messageId": "m1", "role": "assistant", "text": "Hel", "partial": true},
            "timestamp": 1700000000000,
            "id": "f1",
            "isStreaming": true,
            "isFinal": false,
            "streamId": "s1",
            "chunkIndex": 0
        }"#;

        let env = Envelope::decode(text).unwrap();
        assert_eq!(env.id, "f1");
        assert_eq!(env.timestamp, 1_700_000_000_000);
        assert!(env.stream.is_streaming);
        assert_eq!(env.stream.stream_id.as_deref(), Some("s1"));

        match env.message {
            AgentMessage::ConversationUpdate(p) => {
                assert_eq!(p.message_id.as_deref(), Some("m1"));
                assert_eq!(p.text.as_deref(), Some("Hel"));
                assert_eq!(p.partial, Some(true));
            }
            other => panic!("Expected ConversationUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_kind_preserved() {
        let text = r#"{"type": "TelemetryBurst", "payload": {"x": 1}, "id": "f2", "timestamp": 5}"#;
        let env = Envelope::decode(text).unwrap();
        match env.message {
            AgentMessage::Unknown { kind, payload } => {
                assert_eq!(kind, "TelemetryBurst");
                assert_eq!(payload["x"], 1);
            }
            other => panic!("Expected Unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_optional_fields_defaults() {
        let text = r#"{"type": "Ping"}"#;
        let env = Envelope::decode(text).unwrap();
        assert_eq!(env.message, AgentMessage::Ping);
        assert_eq!(env.id, "");
        assert_eq!(env.timestamp, 0);
        assert!(!env.stream.is_streaming);
    }

    #[test]
    fn test_decode_malformed_json_is_error() {
        assert!(Envelope::decode("{not json").is_err());
    }

    #[test]
    fn test_decode_bad_payload_shape_is_error() {
        // capabilities must be an array
        let text = r#"{"type": "ClientHandshake", "payload": {"clientType": "t", "version": "1.0", "capabilities": 7}}"#;
        let err = Envelope::decode(text).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn test_encode_decode_handshake() {
        let env = Envelope::new(
            "h1",
            42,
            AgentMessage::ClientHandshake(HandshakePayload {
                client_type: "tether".to_string(),
                version: "1.0".to_string(),
                capabilities: vec!["chat".to_string()],
            }),
        );

        let text = env.encode().unwrap();
        assert!(text.contains(r#""type":"ClientHandshake""#));
        assert!(text.contains(r#""clientType":"tether""#));

        let decoded = Envelope::decode(&text).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_encode_connection_rejected_reason() {
        let env = Envelope::new(
            "r1",
            0,
            AgentMessage::ConnectionRejected {
                reason: Some("incompatible version".to_string()),
            },
        );
        let text = env.encode().unwrap();
        let decoded = Envelope::decode(&text).unwrap();
        match decoded.message {
            AgentMessage::ConnectionRejected { reason } => {
                assert_eq!(reason.as_deref(), Some("incompatible version"));
            }
            other => panic!("Expected ConnectionRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_conversation_roundtrip() {
        let env = Envelope::new(
            "c1",
            7,
            AgentMessage::ConversationUpdate(ConversationPayload {
                message_id: Some("m9".to_string()),
                role: Some("assistant".to_string()),
                text: Some("Hello".to_string()),
                partial: Some(false),
                ..Default::default()
            }),
        );
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }
}
