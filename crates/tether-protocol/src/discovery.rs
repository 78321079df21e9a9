//! Discovery probe response body
//!
//! A host running the companion agent answers
//! `GET http://<ip>:<port>/discover` with HTTP 200 and this JSON body.
//! Anything else (other status, timeout, malformed body) means the host
//! does not offer the service.

use serde::{Deserialize, Serialize};

/// JSON body of a successful discovery probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    /// Human-readable service name
    pub name: String,
    /// WebSocket endpoint the agent channel should connect to
    pub websocket_url: String,
    /// Protocol version the service speaks
    pub version: String,
    /// Platform tag (e.g., "macOS", "linux")
    pub platform: String,
    /// Application identifier
    #[serde(default)]
    pub app: Option<String>,
    /// Capabilities the service advertises
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_body() {
        let body = r#"{"name":"Agent-A","websocket_url":"ws://10.0.0.5:9000","version":"1.0","platform":"macOS","app":"Agent","capabilities":["chat"]}"#;
        let resp: DiscoveryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.name, "Agent-A");
        assert_eq!(resp.websocket_url, "ws://10.0.0.5:9000");
        assert_eq!(resp.capabilities, vec!["chat".to_string()]);
    }

    #[test]
    fn test_decode_optional_fields_absent() {
        let body = r#"{"name":"A","websocket_url":"ws://h:1","version":"1.0","platform":"linux"}"#;
        let resp: DiscoveryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.app, None);
        assert!(resp.capabilities.is_empty());
    }

    #[test]
    fn test_decode_missing_required_field_fails() {
        let body = r#"{"name":"A","version":"1.0","platform":"linux"}"#;
        assert!(serde_json::from_str::<DiscoveryResponse>(body).is_err());
    }
}
