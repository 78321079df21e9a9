//! Local network interface inspection
//!
//! Picks the interface to sweep from a priority-ordered candidate list.
//! No candidate with an IPv4 address means discovery cannot run at all;
//! that is a hard error surfaced to the caller, not a silent fallback to
//! some default subnet.

use std::net::Ipv4Addr;

use tether_core::error::DiscoveryError;

/// The local IPv4 identity discovery sweeps from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNetwork {
    /// Local IPv4 address on the selected interface
    pub address: Ipv4Addr,
    /// First three octets, e.g. "10.0.0"
    pub subnet_prefix: String,
    /// Name of the selected interface
    pub interface: String,
}

/// Inspect local interfaces and select the scan subnet.
///
/// `priority` is the ordered list of interface names to consider; the
/// first one carrying a non-loopback IPv4 address wins.
pub fn local_network_info(priority: &[String]) -> Result<LocalNetwork, DiscoveryError> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| DiscoveryError::InterfaceEnumeration(e.to_string()))?;

    let candidates: Vec<(String, Ipv4Addr)> = interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => Some((iface.name, v4.ip)),
            _ => None,
        })
        .collect();

    select_interface(&candidates, priority).ok_or(DiscoveryError::NetworkInfoUnavailable)
}

/// Pick the first priority entry present among the candidates
fn select_interface(
    candidates: &[(String, Ipv4Addr)],
    priority: &[String],
) -> Option<LocalNetwork> {
    for name in priority {
        if let Some((interface, address)) = candidates.iter().find(|(n, _)| n == name) {
            return Some(LocalNetwork {
                address: *address,
                subnet_prefix: subnet_prefix(*address),
                interface: interface.clone(),
            });
        }
    }
    None
}

/// The /24 prefix of an address, e.g. 10.0.0.17 -> "10.0.0"
pub fn subnet_prefix(address: Ipv4Addr) -> String {
    let octets = address.octets();
    format!("{}.{}.{}", octets[0], octets[1], octets[2])
}
