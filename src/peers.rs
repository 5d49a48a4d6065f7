//! Peer Abstractions
//!
//! Interfaces the group uses to reach the rest of the cluster, plus the
//! request/response payloads exchanged between peers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Wire Payloads ==
/// A cache lookup addressed to a remote peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Name of the group holding the key
    pub group: String,
    /// The key to fetch
    pub key: String,
}

/// A remote peer's answer to a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// The value bytes
    pub value: Vec<u8>,
}

// == Peer Picker ==
/// Chooses the peer that owns a key.
///
/// Returns `None` when the local node is the owner, in which case the caller
/// loads from its own data source.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

// == Peer Getter ==
/// Fetches a value from one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, req: &RpcRequest) -> Result<RpcResponse>;
}
