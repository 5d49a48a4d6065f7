//! RPC Client
//!
//! Fetches cache values from one remote peer. The peer's address comes from
//! the service registry at call time; the HTTP client is built per call with
//! a bounded dial timeout and an overall deadline, mirroring a fresh dial per
//! request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::peers::{PeerGetter, RpcRequest, RpcResponse};
use crate::registry::ServiceRegistry;

/// Bound on establishing the TCP connection.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Overall per-call deadline.
const RPC_DEADLINE: Duration = Duration::from_secs(10);

// == RPC Client ==
/// Client for a single remote peer, addressed by service name
/// (`"peercache/<addr>"`).
pub struct RpcClient {
    service: String,
    registry: Arc<dyn ServiceRegistry>,
}

impl RpcClient {
    pub fn new(service: impl Into<String>, registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            service: service.into(),
            registry,
        }
    }
}

#[async_trait]
impl PeerGetter for RpcClient {
    /// Issues the lookup. Every failure mode — resolution, dial, deadline,
    /// bad status, decode — surfaces as `PeerUnavailable`, which the group
    /// downgrades to a local load.
    async fn get(&self, req: &RpcRequest) -> Result<RpcResponse> {
        let addr = self
            .registry
            .resolve(&self.service)
            .await
            .map_err(|err| CacheError::PeerUnavailable(err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(DIAL_TIMEOUT)
            .timeout(RPC_DEADLINE)
            .build()
            .map_err(|err| CacheError::PeerUnavailable(err.to_string()))?;

        let url = format!("http://{addr}/_cache");
        let response = client
            .get(&url)
            .query(&[("group", req.group.as_str()), ("key", req.key.as_str())])
            .send()
            .await
            .map_err(|err| CacheError::PeerUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::PeerUnavailable(format!(
                "peer {addr} answered {}",
                response.status()
            )));
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|err| CacheError::PeerUnavailable(format!("decoding response body: {err}")))
    }
}
