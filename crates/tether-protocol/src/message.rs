//! Message types for the tether agent channel
//!
//! The agent service tags every frame with a `type` string. Known
//! discriminants map onto [`AgentMessage`] variants with typed payloads;
//! anything else is preserved as [`AgentMessage::Unknown`] so a newer
//! server never kills an older client.
//!
//! # Message Flow
//!
//! Typical sequence for one channel:
//!
//! 1. Client connects and sends `ClientHandshake`
//! 2. Server responds with `ConnectionAccepted` (or `ConnectionRejected`)
//! 3. `Ping`/`Pong` exchanged on a fixed interval while connected
//! 4. Conversational traffic: `ConversationUpdate`, `CommandResult`,
//!    `PermissionRequest` frames flow from the server, possibly as
//!    partial updates sharing one logical message id
//! 5. `SessionStatus` frames carry lifecycle bookkeeping and are not
//!    shown to the user

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kind discriminant carried in the envelope `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Client identity/version/capabilities, sent while connecting
    ClientHandshake,
    /// Server accepted the handshake
    ConnectionAccepted,
    /// Server rejected the handshake
    ConnectionRejected,
    /// Keepalive ping
    Ping,
    /// Keepalive pong
    Pong,
    /// Conversational message (possibly a partial streaming update)
    ConversationUpdate,
    /// Result of a command the agent ran
    CommandResult,
    /// The agent is asking the user for permission
    PermissionRequest,
    /// Session lifecycle/bookkeeping, hidden from the conversation view
    SessionStatus,
    /// Error report from the server
    Error,
}

impl MessageKind {
    /// Wire string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ClientHandshake => "ClientHandshake",
            MessageKind::ConnectionAccepted => "ConnectionAccepted",
            MessageKind::ConnectionRejected => "ConnectionRejected",
            MessageKind::Ping => "Ping",
            MessageKind::Pong => "Pong",
            MessageKind::ConversationUpdate => "ConversationUpdate",
            MessageKind::CommandResult => "CommandResult",
            MessageKind::PermissionRequest => "PermissionRequest",
            MessageKind::SessionStatus => "SessionStatus",
            MessageKind::Error => "Error",
        }
    }

    /// Parse a wire string; `None` for unrecognized discriminants
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "ClientHandshake" => Some(Self::ClientHandshake),
            "ConnectionAccepted" => Some(Self::ConnectionAccepted),
            "ConnectionRejected" => Some(Self::ConnectionRejected),
            "Ping" => Some(Self::Ping),
            "Pong" => Some(Self::Pong),
            "ConversationUpdate" => Some(Self::ConversationUpdate),
            "CommandResult" => Some(Self::CommandResult),
            "PermissionRequest" => Some(Self::PermissionRequest),
            "SessionStatus" => Some(Self::SessionStatus),
            "Error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Payload of the `ClientHandshake` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    /// Client type identifier (e.g., "tether")
    pub client_type: String,
    /// Protocol version the client speaks
    pub version: String,
    /// Capabilities the client supports
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Payload shape shared by conversational frames.
///
/// Every field is optional on the wire; the coalescer decides which
/// combinations are usable and drops the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationPayload {
    /// Server-side session this message belongs to
    pub session_id: Option<String>,
    /// Originating role ("user" or "assistant")
    pub role: Option<String>,
    /// Message content (alias of `text` used by some frame kinds)
    pub content: Option<String>,
    /// Logical message id grouping partial updates into one message
    pub message_id: Option<String>,
    /// Sub-kind tag within the frame kind
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Message text
    pub text: Option<String>,
    /// Whether this is an in-progress streaming update
    pub partial: Option<bool>,
}

impl ConversationPayload {
    /// The usable text of this payload (`text` preferred over `content`)
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.content.as_deref())
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Client identity declaration, sent while connecting
    ClientHandshake(HandshakePayload),

    /// Handshake accepted; the channel is live
    ConnectionAccepted,

    /// Handshake rejected
    ConnectionRejected {
        /// Reason if the server supplied one
        reason: Option<String>,
    },

    /// Keepalive ping
    Ping,

    /// Keepalive pong
    Pong,

    /// Conversational message or partial streaming update
    ConversationUpdate(ConversationPayload),

    /// Result of a command the agent executed
    CommandResult(ConversationPayload),

    /// The agent asks the user to approve something
    PermissionRequest(ConversationPayload),

    /// Lifecycle bookkeeping; never surfaced in the conversation view
    SessionStatus(Value),

    /// Error report from the server
    Error {
        /// Human-readable message
        message: String,
    },

    /// Frame with an unrecognized discriminant, preserved as-is
    Unknown {
        /// The wire `type` string
        kind: String,
        /// The raw payload
        payload: Value,
    },
}

impl AgentMessage {
    /// Wire discriminant string for this message
    pub fn kind_str(&self) -> &str {
        match self {
            AgentMessage::ClientHandshake(_) => MessageKind::ClientHandshake.as_str(),
            AgentMessage::ConnectionAccepted => MessageKind::ConnectionAccepted.as_str(),
            AgentMessage::ConnectionRejected { .. } => MessageKind::ConnectionRejected.as_str(),
            AgentMessage::Ping => MessageKind::Ping.as_str(),
            AgentMessage::Pong => MessageKind::Pong.as_str(),
            AgentMessage::ConversationUpdate(_) => MessageKind::ConversationUpdate.as_str(),
            AgentMessage::CommandResult(_) => MessageKind::CommandResult.as_str(),
            AgentMessage::PermissionRequest(_) => MessageKind::PermissionRequest.as_str(),
            AgentMessage::SessionStatus(_) => MessageKind::SessionStatus.as_str(),
            AgentMessage::Error { .. } => MessageKind::Error.as_str(),
            AgentMessage::Unknown { kind, .. } => kind,
        }
    }
}
