//! /24 subnet sweep for companion services
//!
//! Probes every host address (.1 through .254) on the selected subnet
//! concurrently under the [`ProbeLimiter`]. A probe succeeds only on
//! HTTP 200 with a well-formed descriptor body; timeouts, refusals, other
//! statuses, and malformed bodies are silent misses. The sweep is
//! cancellable: cancellation stops issuing new probes, abandons the
//! outstanding ones, and returns whatever already arrived.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use tether_core::config::DiscoveryConfig;
use tether_core::error::DiscoveryError;
use tether_core::ServiceDescriptor;
use tether_protocol::{DiscoveryResponse, DISCOVERY_PATH};

use crate::limiter::ProbeLimiter;
use crate::network::{local_network_info, LocalNetwork};

/// Sweeps a /24 for hosts answering the discovery endpoint
pub struct DiscoveryScanner {
    config: DiscoveryConfig,
    client: reqwest::Client,
    limiter: Arc<ProbeLimiter>,
}

impl DiscoveryScanner {
    /// Create a scanner from discovery configuration
    pub fn new(config: DiscoveryConfig) -> Self {
        let limiter = Arc::new(ProbeLimiter::new(config.max_parallel_probes));
        Self {
            config,
            client: reqwest::Client::new(),
            limiter,
        }
    }

    /// The limiter capping parallel probes (exposed for instrumentation)
    pub fn limiter(&self) -> &Arc<ProbeLimiter> {
        &self.limiter
    }

    /// Resolve the local subnet and sweep it.
    ///
    /// Fails only when no usable interface exists; an empty sweep result
    /// is not an error.
    pub async fn discover(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        let network: LocalNetwork = local_network_info(&self.config.interface_priority)?;
        info!(
            "Scanning {}.0/24 via {} ({})",
            network.subnet_prefix, network.interface, network.address
        );
        Ok(self.scan(&network.subnet_prefix, cancel).await)
    }

    /// Probe every host address on `subnet_prefix` (e.g. "10.0.0").
    ///
    /// Result order is whatever order probes complete in; callers must not
    /// rely on it.
    pub async fn scan(
        &self,
        subnet_prefix: &str,
        cancel: CancellationToken,
    ) -> Vec<ServiceDescriptor> {
        let mut probes = JoinSet::new();

        for host in 1..=254u8 {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.limiter.acquire() => permit,
            };

            let url = format!(
                "http://{}.{}:{}{}",
                subnet_prefix, host, self.config.port, DISCOVERY_PATH
            );
            let client = self.client.clone();
            let timeout = self.config.probe_timeout;

            probes.spawn(async move {
                let result = probe(&client, &url, timeout).await;
                drop(permit);
                result
            });
        }

        let mut found = Vec::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Abandon outstanding probes; keep what already arrived.
                    probes.detach_all();
                    break;
                }
                next = probes.join_next() => match next {
                    Some(Ok(Some(descriptor))) => found.push(descriptor),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => debug!("Probe task failed: {}", e),
                    None => break,
                },
            }
        }

        debug!("Scan of {}.0/24 found {} service(s)", subnet_prefix, found.len());
        found
    }
}

/// Probe one candidate host.
///
/// Every failure mode is a miss: most addresses simply do not host the
/// service.
async fn probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Option<ServiceDescriptor> {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            trace!("Probe miss for {}: {}", url, e);
            return None;
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        trace!("Probe miss for {}: status {}", url, response.status());
        return None;
    }

    match response.json::<DiscoveryResponse>().await {
        Ok(body) => {
            debug!("Discovered service '{}' at {}", body.name, body.websocket_url);
            Some(body.into())
        }
        Err(e) => {
            trace!("Malformed discovery body from {}: {}", url, e);
            None
        }
    }
}
