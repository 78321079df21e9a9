//! tether-channel: The agent channel session
//!
//! Owns one logical WebSocket channel to a discovered companion service:
//! connect, handshake, keepalive, send, receive loop, disconnect. Inbound
//! conversational frames are folded into stable state by the
//! [`coalescer::MessageCoalescer`], which callers observe through a watch
//! channel instead of seeing every micro-update.

pub mod coalescer;
pub mod session;

pub use coalescer::{ConversationKind, ConversationMessage, MessageCoalescer};
pub use session::ChannelSession;
