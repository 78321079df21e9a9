//! Streaming message coalescer
//!
//! The companion service may emit one logical message as a run of partial
//! updates (same logical id, `partial = true`) closed by a final update.
//! The coalescer folds that run into a single entry that grows in place,
//! so consumers see a stable list instead of a new row per token.
//!
//! Matching rule: a partial or final update applies to the most recent
//! still-open partial entry with the same logical id. A finalized entry is
//! never reopened; a later message reusing its logical id starts a new
//! entry.

use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use tether_protocol::{AgentMessage, ConversationPayload, Envelope};

/// Category of a coalesced conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    /// Text originating from the user
    UserText,
    /// Text generated by the agent
    AssistantText,
    /// Output of a command the agent ran
    CommandResult,
    /// The agent asking the user to approve something
    PermissionRequest,
    /// Error reported by the agent
    Error,
    /// Lifecycle/bookkeeping traffic, kept but never shown
    Lifecycle,
}

impl ConversationKind {
    /// Whether entries of this kind appear in the visible list
    pub fn is_visible(&self) -> bool {
        !matches!(self, ConversationKind::Lifecycle)
    }
}

/// One coalesced conversation entry.
///
/// Mutable only while `partial` is true; finalization clears the flag and
/// freezes the entry in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    /// Frame id of the message that created this entry
    pub id: String,
    /// Logical message id grouping partial updates, if any
    pub logical_id: Option<String>,
    /// Entry category
    pub kind: ConversationKind,
    /// Current text
    pub text: String,
    /// Whether more updates are expected
    pub partial: bool,
    /// Timestamp of the latest update applied
    pub timestamp: u64,
}

/// Folds the inbound frame stream into a stable, de-duplicated list
pub struct MessageCoalescer {
    all: Vec<ConversationMessage>,
    visible_tx: watch::Sender<Vec<ConversationMessage>>,
}

impl MessageCoalescer {
    /// Create an empty coalescer
    pub fn new() -> Self {
        let (visible_tx, _) = watch::channel(Vec::new());
        Self {
            all: Vec::new(),
            visible_tx,
        }
    }

    /// Subscribe to the visible message list
    pub fn subscribe(&self) -> watch::Receiver<Vec<ConversationMessage>> {
        self.visible_tx.subscribe()
    }

    /// Every message ever received, in insertion order
    pub fn all(&self) -> &[ConversationMessage] {
        &self.all
    }

    /// The current visible list
    pub fn visible(&self) -> Vec<ConversationMessage> {
        self.all
            .iter()
            .filter(|m| m.kind.is_visible())
            .cloned()
            .collect()
    }

    /// Ingest one inbound envelope.
    ///
    /// Frames whose payload cannot be mapped are dropped with a warning
    /// and leave existing entries untouched.
    pub fn ingest(&mut self, envelope: &Envelope) {
        let Some(message) = map_message(envelope) else {
            warn!(
                "Dropping unmappable {} frame (id '{}')",
                envelope.message.kind_str(),
                envelope.id
            );
            return;
        };
        self.coalesce(message);
        self.publish();
    }

    fn coalesce(&mut self, message: ConversationMessage) {
        if let Some(logical_id) = message.logical_id.as_deref() {
            // Most recent still-open partial with the same logical id.
            // Position and entry id are preserved on overwrite.
            if let Some(open) = self
                .all
                .iter_mut()
                .rev()
                .find(|m| m.partial && m.logical_id.as_deref() == Some(logical_id))
            {
                open.text = message.text;
                open.partial = message.partial;
                open.timestamp = message.timestamp;
                return;
            }

            // Finalizing twice with identical content is a no-op; a
            // finalized entry is never resurrected.
            if !message.partial {
                if let Some(latest) = self
                    .all
                    .iter()
                    .rev()
                    .find(|m| m.logical_id.as_deref() == Some(logical_id))
                {
                    if !latest.partial && latest.text == message.text {
                        return;
                    }
                }
            }
        }

        self.all.push(message);
    }

    fn publish(&self) {
        self.visible_tx.send_replace(self.visible());
    }
}

impl Default for MessageCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an inbound envelope to its conversation entry.
///
/// Returns `None` for frames that carry no usable conversation content
/// (missing frame id or text).
fn map_message(envelope: &Envelope) -> Option<ConversationMessage> {
    if envelope.id.is_empty() {
        return None;
    }

    let (kind, payload) = match &envelope.message {
        AgentMessage::ConversationUpdate(payload) => (role_kind(payload), payload),
        AgentMessage::CommandResult(payload) => (ConversationKind::CommandResult, payload),
        AgentMessage::PermissionRequest(payload) => (ConversationKind::PermissionRequest, payload),
        AgentMessage::Error { message } => {
            return Some(ConversationMessage {
                id: envelope.id.clone(),
                logical_id: None,
                kind: ConversationKind::Error,
                text: message.clone(),
                partial: false,
                timestamp: envelope.timestamp,
            });
        }
        AgentMessage::SessionStatus(payload) => {
            return Some(ConversationMessage {
                id: envelope.id.clone(),
                logical_id: None,
                kind: ConversationKind::Lifecycle,
                text: status_text(payload),
                partial: false,
                timestamp: envelope.timestamp,
            });
        }
        // Handshake and keepalive frames never reach the coalescer
        _ => return None,
    };

    let text = payload.body()?.to_string();

    Some(ConversationMessage {
        id: envelope.id.clone(),
        logical_id: payload.message_id.clone(),
        kind,
        text,
        partial: payload.partial.unwrap_or(false),
        timestamp: envelope.timestamp,
    })
}

fn role_kind(payload: &ConversationPayload) -> ConversationKind {
    match payload.role.as_deref() {
        Some("user") => ConversationKind::UserText,
        _ => ConversationKind::AssistantText,
    }
}

fn status_text(payload: &Value) -> String {
    payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
