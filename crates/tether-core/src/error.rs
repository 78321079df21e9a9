//! Core error types for tether
//!
//! Per-probe misses and per-frame decode failures are absorbed where they
//! happen and never abort the owning loop; the errors here are the ones
//! that reach callers or put a session into the Failed state.

use std::path::PathBuf;
use tether_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for the tether ecosystem
#[derive(Error, Debug)]
pub enum TetherError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Agent channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Remote session error
    #[error("Remote session error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Service discovery errors.
///
/// A single host that times out or refuses the probe is not an error; it
/// simply is not running the service. Only failures that end the whole
/// scan attempt surface here.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// No candidate interface had an IPv4 address
    #[error("No usable network interface found")]
    NetworkInfoUnavailable,

    /// Interface enumeration itself failed
    #[error("Failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(String),
}

/// Agent channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The server rejected our handshake
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// No handshake response arrived in time
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// The transport failed or closed underneath us
    #[error("Transport lost: {0}")]
    TransportLost(String),

    /// Operation requires an established channel
    #[error("Not connected")]
    NotConnected,
}

/// Remote execution session errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// SSH authentication was rejected
    #[error("Authentication failed for {user}@{host}")]
    AuthenticationFailed { user: String, host: String },

    /// The SSH or SFTP transport failed
    #[error("Transport lost: {0}")]
    TransportLost(String),

    /// A command or file operation failed; the session stays usable
    #[error("Remote operation failed: {0}")]
    OperationFailed(String),

    /// Operation requires a connected session
    #[error("Not connected")]
    NotConnected,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
