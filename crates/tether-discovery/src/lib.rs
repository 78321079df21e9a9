//! tether-discovery: Local-network discovery of companion services
//!
//! Sweeps the local /24, probing each host's discovery endpoint over HTTP
//! with bounded parallelism. A host that answers 200 with a well-formed
//! descriptor body becomes a [`tether_core::ServiceDescriptor`]; everything
//! else is a silent miss.

pub mod limiter;
pub mod network;
pub mod scanner;

pub use limiter::{ProbeLimiter, ProbePermit};
pub use network::{local_network_info, LocalNetwork};
pub use scanner::DiscoveryScanner;
