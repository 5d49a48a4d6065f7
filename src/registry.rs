//! Service Registry Glue
//!
//! The cluster discovers peers through an external registry. The core needs
//! exactly two operations from it: publish this node under a service name
//! (holding a keepalive until told to stop), and resolve a peer's service
//! name to a dialable address.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{CacheError, Result};

/// Interval between keepalive heartbeats while registered.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

// == Registry Interface ==
/// Service publish/resolve operations consumed by the cache core.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Publishes `addr` under `service` and blocks, maintaining a keepalive,
    /// until the stop channel fires.
    async fn register(&self, service: &str, addr: &str, stop: watch::Receiver<bool>)
        -> Result<()>;

    /// Resolves a peer service name to its network address.
    async fn resolve(&self, service: &str) -> Result<String>;
}

// == Static Registry ==
/// Registry backed by the naming convention alone.
///
/// Peer clients are created with service names of the form
/// `"<service>/<addr>"`, so the address is recoverable without an external
/// store. Registration is a heartbeat loop that exists to hold the slot and
/// surface liveness in the logs.
pub struct StaticRegistry {
    keepalive: Duration,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            keepalive: KEEPALIVE_INTERVAL,
        }
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
    async fn register(
        &self,
        service: &str,
        addr: &str,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        info!("registered {addr} under service {service}");
        let mut ticker = tokio::time::interval(self.keepalive);
        ticker.tick().await; // first tick completes immediately
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    info!("deregistering {addr} from service {service}");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    debug!("keepalive for {service} ({addr})");
                }
            }
        }
    }

    async fn resolve(&self, service: &str) -> Result<String> {
        match service.split_once('/') {
            Some((_, addr)) if !addr.is_empty() => Ok(addr.to_string()),
            _ => Err(CacheError::Registry(format!(
                "service name {service:?} carries no address"
            ))),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolve_extracts_address() {
        let registry = StaticRegistry::new();
        let addr = registry.resolve("peercache/127.0.0.1:9999").await.unwrap();
        assert_eq!(addr, "127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_resolve_rejects_bare_service_name() {
        let registry = StaticRegistry::new();
        assert!(registry.resolve("peercache").await.is_err());
        assert!(registry.resolve("peercache/").await.is_err());
    }

    #[tokio::test]
    async fn test_register_returns_on_stop_signal() {
        let registry = StaticRegistry::new();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            registry
                .register("peercache", "127.0.0.1:9999", stop_rx)
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        stop_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("register did not observe the stop signal");
        assert!(result.unwrap().is_ok());
    }
}
