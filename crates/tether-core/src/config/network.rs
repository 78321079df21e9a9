//! Discovery, channel, and remote session tunables

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Service discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// TCP port the discovery endpoint listens on
    pub port: u16,

    /// Timeout for a single host probe
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// Maximum number of probes in flight at once
    pub max_parallel_probes: usize,

    /// Interface names to consider, in priority order.
    ///
    /// The first entry with an IPv4 address wins. Defaults cover the
    /// primary wireless, wired, and cellular interfaces on macOS and
    /// Linux.
    pub interface_priority: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: 9876,
            probe_timeout: Duration::from_secs(2),
            max_parallel_probes: 50,
            interface_priority: vec![
                "en0".to_string(),
                "eth0".to_string(),
                "en1".to_string(),
                "wlan0".to_string(),
                "pdp_ip0".to_string(),
            ],
        }
    }
}

/// Agent channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Interval between keepalive pings while connected
    #[serde(with = "duration_secs")]
    pub keepalive_interval: Duration,

    /// How long to wait for the handshake response before failing
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Client type declared in the handshake
    pub client_type: String,

    /// Capabilities declared in the handshake
    pub capabilities: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            client_type: "tether".to_string(),
            capabilities: vec!["chat".to_string()],
        }
    }
}

/// Remote execution session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// How long a cached directory listing stays valid
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,

    /// Maximum lines retained in the session output buffer
    pub output_buffer_lines: usize,

    /// Prompt string prepended to echoed commands in the output buffer
    pub prompt: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            output_buffer_lines: 1000,
            prompt: "$".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.max_parallel_probes, 50);
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.interface_priority[0], "en0");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ChannelConfig = toml::from_str("keepalive_interval = 10").unwrap();
        assert_eq!(config.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.client_type, "tether");
    }
}
