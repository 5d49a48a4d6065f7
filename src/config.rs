//! Configuration Module
//!
//! Handles loading node configuration from environment variables.

use std::env;

use crate::cache::CacheKind;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// This node's advertised address, `host:port`
    pub self_addr: String,
    /// Cluster membership, including this node
    pub peer_addrs: Vec<String>,
    /// Byte budget per cache tier; 0 means unbounded
    pub cache_bytes: i64,
    /// Eviction engine for both tiers
    pub cache_kind: CacheKind,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SELF_ADDR` - advertised address (default: 127.0.0.1:9999)
    /// - `PEER_ADDRS` - comma-separated peer addresses (default: just self)
    /// - `CACHE_BYTES` - per-tier byte budget (default: 2048)
    /// - `CACHE_KIND` - `lru` or `lfu` (default: lru)
    pub fn from_env() -> Self {
        let self_addr = env::var("SELF_ADDR").unwrap_or_else(|_| "127.0.0.1:9999".to_string());
        let peer_addrs = env::var("PEER_ADDRS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|addrs| !addrs.is_empty())
            .unwrap_or_else(|| vec![self_addr.clone()]);
        Self {
            self_addr,
            peer_addrs,
            cache_bytes: env::var("CACHE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2048),
            cache_kind: env::var("CACHE_KIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(CacheKind::Lru),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            self_addr: "127.0.0.1:9999".to_string(),
            peer_addrs: vec!["127.0.0.1:9999".to_string()],
            cache_bytes: 2048,
            cache_kind: CacheKind::Lru,
        }
    }
}
