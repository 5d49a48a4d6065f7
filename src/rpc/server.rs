//! RPC Server Façade
//!
//! Answers cache lookups from peer nodes and owns the cluster-facing
//! lifecycle: the consistent-hash view of the peer set, one RPC client per
//! peer, registration with the service registry, and serving until stopped.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{CacheError, Result};
use crate::group::get_group;
use crate::peers::{PeerGetter, PeerPicker, RpcRequest, RpcResponse};
use crate::registry::{ServiceRegistry, StaticRegistry};
use crate::ring::HashRing;
use crate::rpc::RpcClient;

/// Service name this node publishes itself under.
pub const SERVICE_NAME: &str = "peercache";

/// Virtual nodes per peer on the hash ring.
const DEFAULT_REPLICAS: usize = 50;

// == Router ==
/// Builds the router peers talk to.
///
/// # Endpoints
/// - `GET /_cache?group=<name>&key=<key>` - cache lookup for peers
/// - `GET /health` - liveness probe
pub fn create_router(self_addr: String) -> Router {
    Router::new()
        .route("/_cache", get(cache_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(self_addr)
}

/// Handler for GET /_cache
///
/// Resolves the group from the process-wide registry and delegates to its
/// read path; the response carries the raw value bytes.
async fn cache_handler(
    State(self_addr): State<String>,
    Query(req): Query<RpcRequest>,
) -> Result<Json<RpcResponse>> {
    info!(
        "[server {self_addr}] recv rpc request - ({})/({})",
        req.group, req.key
    );
    if req.key.is_empty() {
        return Err(CacheError::KeyRequired);
    }
    let group = get_group(&req.group).ok_or_else(|| CacheError::GroupNotFound(req.group.clone()))?;
    let view = group.get(&req.key).await?;
    Ok(Json(RpcResponse {
        value: view.byte_slice(),
    }))
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Handler for GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// == Server State ==
struct ServerState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    peers: HashRing,
    clients: HashMap<String, Arc<RpcClient>>,
}

// == Cache Server ==
/// Peer-facing server for one node.
///
/// Decoupled from any particular group: incoming requests name their group
/// and are dispatched through the process-wide group registry. The server
/// also implements [`PeerPicker`], which is how groups route keys to their
/// owners.
pub struct CacheServer {
    /// This node's address, `host:port`
    self_addr: String,
    registry: Arc<dyn ServiceRegistry>,
    state: Mutex<ServerState>,
}

impl CacheServer {
    // == Constructors ==
    /// Creates a stopped server for `self_addr` using the default registry.
    pub fn new(self_addr: impl Into<String>) -> Result<Arc<Self>> {
        Self::with_registry(self_addr, Arc::new(StaticRegistry::new()))
    }

    /// Creates a stopped server with an explicit registry implementation.
    pub fn with_registry(
        self_addr: impl Into<String>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Result<Arc<Self>> {
        let self_addr = self_addr.into();
        port_of(&self_addr)?;
        Ok(Arc::new(Self {
            self_addr,
            registry,
            state: Mutex::new(ServerState {
                running: false,
                stop_tx: None,
                peers: HashRing::new(DEFAULT_REPLICAS),
                clients: HashMap::new(),
            }),
        }))
    }

    /// Returns this node's address.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    // == Set ==
    /// Adds peers (normally including this node) to the hash ring and
    /// creates a client per address, keyed `"peercache/<addr>"`.
    pub fn set<S: AsRef<str>>(&self, peer_addrs: &[S]) {
        let mut state = self.state.lock();
        state.peers.add(peer_addrs.iter().map(AsRef::as_ref));
        for addr in peer_addrs {
            let addr = addr.as_ref();
            let service = format!("{SERVICE_NAME}/{addr}");
            state.clients.insert(
                addr.to_string(),
                Arc::new(RpcClient::new(service, self.registry.clone())),
            );
        }
    }

    // == Start ==
    /// Binds this node's port, publishes the node with the registry, and
    /// serves peer requests until [`CacheServer::stop`] is called.
    ///
    /// Fails with `AlreadyStarted` if the server is running.
    pub async fn start(&self) -> Result<()> {
        let stop_rx = {
            let mut state = self.state.lock();
            if state.running {
                return Err(CacheError::AlreadyStarted);
            }
            state.running = true;
            let (stop_tx, stop_rx) = watch::channel(false);
            state.stop_tx = Some(stop_tx);
            stop_rx
        };

        let port = port_of(&self.self_addr)?;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|err| CacheError::Internal(format!("failed to listen on :{port}: {err}")))?;

        let registry = self.registry.clone();
        let self_addr = self.self_addr.clone();
        let registration_stop = stop_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = registry
                .register(SERVICE_NAME, &self_addr, registration_stop)
                .await
            {
                error!("service registration failed: {err}");
            }
            info!("[{self_addr}] revoked service registration");
        });

        info!("[{}] serving cache rpc", self.self_addr);
        let mut shutdown = stop_rx;
        axum::serve(listener, create_router(self.self_addr.clone()))
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|err| CacheError::Internal(format!("serve failed: {err}")))
    }

    // == Stop ==
    /// Signals the accept loop and the registry keepalive to wind down and
    /// releases the peer table. Safe to call any number of times.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        state.running = false;
        state.peers = HashRing::new(DEFAULT_REPLICAS);
        state.clients.clear();
    }
}

// == Peer Picker ==
impl PeerPicker for CacheServer {
    /// Resolves the owner of `key` on the ring. Returns `None` when this
    /// node is the owner, telling the group to load locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock();
        let peer = state.peers.get(key)?;
        if peer == self.self_addr {
            info!("ooh! pick myself, I am {}", self.self_addr);
            return None;
        }
        info!("[cache {}] pick remote peer: {peer}", self.self_addr);
        let client = state.clients.get(peer)?.clone();
        Some(client)
    }
}

/// Extracts the port from a `host:port` address.
fn port_of(addr: &str) -> Result<u16> {
    addr.rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or_else(|| CacheError::Config(format!("address {addr:?} has no usable port")))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_rejects_portless_address() {
        assert!(matches!(
            CacheServer::new("no-port-here").map(|_| ()),
            Err(CacheError::Config(_))
        ));
        assert!(CacheServer::new("127.0.0.1:9999").is_ok());
    }

    #[test]
    fn test_pick_peer_returns_none_for_self() {
        let server = CacheServer::new("127.0.0.1:9999").unwrap();
        server.set(&["127.0.0.1:9999"]);
        // Sole ring member is this node, whatever the key hashes to.
        assert!(server.pick_peer("Tom").is_none());
        assert!(server.pick_peer("Jack").is_none());
    }

    #[test]
    fn test_pick_peer_returns_client_for_remote_owner() {
        let server = CacheServer::new("127.0.0.1:9999").unwrap();
        server.set(&["127.0.0.1:8888"]);
        assert!(server.pick_peer("Tom").is_some());
    }

    #[test]
    fn test_pick_peer_on_empty_ring() {
        let server = CacheServer::new("127.0.0.1:9999").unwrap();
        assert!(server.pick_peer("Tom").is_none());
    }

    #[tokio::test]
    async fn test_double_start_fails_and_stop_is_idempotent() {
        let server = CacheServer::new("127.0.0.1:0").unwrap();

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.start().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(server.start().await, Err(CacheError::AlreadyStarted));

        server.stop();
        server.stop(); // second stop is a no-op

        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("server did not shut down");
        assert!(result.unwrap().is_ok());
    }
}
