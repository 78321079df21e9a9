//! tether-protocol: Wire protocol for the tether agent channel
//!
//! This crate defines the JSON envelope exchanged with the companion agent
//! service over the WebSocket channel, plus the HTTP discovery response
//! body. The envelope is decoded in two passes: first the `type`
//! discriminant, then the payload shape that matches it. Unrecognized
//! discriminants decode into an `Unknown` variant rather than failing the
//! whole frame.

pub mod discovery;
pub mod envelope;
pub mod error;
pub mod message;

pub use discovery::DiscoveryResponse;
pub use envelope::{Envelope, StreamInfo};
pub use error::ProtocolError;
pub use message::{AgentMessage, ConversationPayload, HandshakePayload, MessageKind};

/// Current protocol version string.
///
/// Included in the `ClientHandshake` payload so the agent service can
/// reject incompatible clients.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Well-known HTTP path probed during discovery.
pub const DISCOVERY_PATH: &str = "/discover";
