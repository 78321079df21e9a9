//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use tether_protocol::DiscoveryResponse;

/// A validated companion service found by a discovery scan.
///
/// Immutable once discovered. Identity is the endpoint URL: two
/// descriptors naming the same endpoint describe the same service even if
/// other fields differ between scans.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Human-readable service name
    pub name: String,
    /// WebSocket endpoint for the agent channel
    pub endpoint: String,
    /// Protocol version the service speaks
    pub version: String,
    /// Platform tag (e.g., "macOS", "linux")
    pub platform: String,
    /// Capabilities the service advertises
    pub capabilities: Vec<String>,
}

impl ServiceDescriptor {
    /// Check whether the service advertises a capability
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint
    }
}

impl std::hash::Hash for ServiceDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.endpoint.hash(state);
    }
}

impl From<DiscoveryResponse> for ServiceDescriptor {
    fn from(resp: DiscoveryResponse) -> Self {
        Self {
            name: resp.name,
            endpoint: resp.websocket_url,
            version: resp.version,
            platform: resp.platform,
            capabilities: resp.capabilities,
        }
    }
}

/// Lifecycle state of a connection-owning session.
///
/// `Connected` is only entered after the handshake is accepted;
/// `Failed -> Disconnected` happens only through an explicit disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection; the session is idle
    #[default]
    Disconnected,
    /// Transport is opening or the handshake is in flight
    Connecting,
    /// Handshake accepted; the channel is live
    Connected,
    /// The connection failed; carries a human-readable reason
    Failed(String),
}

impl ConnectionState {
    /// Whether the session is fully established
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether frames may be written (the handshake itself is sent while
    /// still Connecting)
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    /// The failure reason, if the session is in the Failed state
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// File name without path
    pub name: String,
    /// Absolute remote path
    pub path: String,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Size in bytes
    pub size: u64,
    /// Modification time in Unix seconds, if the server reported one
    pub modified: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_identity_is_endpoint() {
        let a = ServiceDescriptor {
            name: "Agent-A".to_string(),
            endpoint: "ws://10.0.0.5:9000".to_string(),
            version: "1.0".to_string(),
            platform: "macOS".to_string(),
            capabilities: vec![],
        };
        let mut b = a.clone();
        b.name = "Renamed".to_string();
        b.version = "1.1".to_string();
        assert_eq!(a, b);

        let mut c = a.clone();
        c.endpoint = "ws://10.0.0.6:9000".to_string();
        assert_ne!(a, c);
    }

    #[test]
    fn test_descriptor_capability_lookup() {
        let desc = ServiceDescriptor {
            name: "A".to_string(),
            endpoint: "ws://h:1".to_string(),
            version: "1.0".to_string(),
            platform: "linux".to_string(),
            capabilities: vec!["Chat".to_string()],
        };
        assert!(desc.has_capability("chat"));
        assert!(!desc.has_capability("files"));
    }

    #[test]
    fn test_connection_state_can_send() {
        assert!(ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Connected.can_send());
        assert!(!ConnectionState::Disconnected.can_send());
        assert!(!ConnectionState::Failed("x".to_string()).can_send());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "connected");
        assert_eq!(
            format!("{}", ConnectionState::Failed("boom".to_string())),
            "failed: boom"
        );
    }
}
