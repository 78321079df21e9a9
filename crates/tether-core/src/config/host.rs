//! Remote host configuration

use serde::{Deserialize, Serialize};

/// Connection profile for a remote shell host.
///
/// Created by the configuration surface and passed by value into a remote
/// execution session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfiguration {
    /// Human-readable profile name
    pub name: String,
    /// Hostname or IP address
    pub hostname: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username for authentication
    pub username: String,
    /// Password credential
    pub password: String,
}

fn default_port() -> u16 {
    22
}

impl HostConfiguration {
    /// The `host:port` address string for the SSH transport
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        let toml = r#"
            name = "lab"
            hostname = "10.0.0.9"
            username = "dev"
            password = "pw"
        "#;
        let config: HostConfiguration = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.address(), "10.0.0.9:22");
    }
}
