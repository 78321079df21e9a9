//! tether-core: Core types, errors, and configuration for tether
//!
//! This crate provides the domain types, error taxonomy, and configuration
//! structures shared by the discovery, channel, and remote-session crates.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::TetherError;
pub use types::{ConnectionState, RemoteFile, ServiceDescriptor};
