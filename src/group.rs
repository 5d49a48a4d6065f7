//! Group Module
//!
//! A group is a cache namespace and the orchestrator of its read path:
//! hot tier, then main tier, then a single-flight load that goes to the
//! owner peer when one is registered and to the local data source otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::byteview::ByteView;
use crate::cache::{CacheKind, SyncCache};
use crate::error::{CacheError, Result};
use crate::peers::{PeerGetter, PeerPicker, RpcRequest};
use crate::singleflight::Flight;

/// Remote-fetch rate (per observed minute bucket) at which a key is promoted
/// into the hot tier.
const MAX_MINUTE_REMOTE_QPS: i64 = 10;

/// Process-wide registry of groups, keyed by name. The RPC server resolves
/// incoming requests against it.
static GROUPS: Lazy<RwLock<HashMap<String, Arc<Group>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// == Loader ==
/// Source of truth consulted on a cache miss.
pub trait Loader: Send + Sync {
    fn load(&self, key: &str) -> Result<Vec<u8>>;
}

/// Any matching closure is a loader.
impl<F> Loader for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self(key)
    }
}

// == Key Stats ==
/// Remote-fetch bookkeeping for one key, used by the hot-promotion policy.
struct KeyStats {
    first_fetch: Instant,
    remote_count: i64,
}

// == Group ==
/// A named cache namespace with a two-tier read path.
///
/// The main tier holds keys this node owns under consistent hashing; the hot
/// tier additionally holds keys observed to be fetched from remote peers at
/// a high rate, absorbing cross-node hot spots.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    main_cache: SyncCache,
    hot_cache: SyncCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    flight: Flight<ByteView>,
    /// Per-key remote-fetch stats; reads and writes both take this lock,
    /// which is never held across I/O.
    keys: Mutex<HashMap<String, KeyStats>>,
}

impl Group {
    // == Constructor ==
    /// Creates a group and registers it process-wide under `name`.
    ///
    /// Both tiers get the same byte budget and eviction engine. Re-using a
    /// name replaces the previous registration.
    pub fn new(
        name: impl Into<String>,
        cache_bytes: i64,
        kind: CacheKind,
        loader: impl Loader + 'static,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group {
            name: name.clone(),
            loader: Box::new(loader),
            main_cache: SyncCache::new(kind, cache_bytes),
            hot_cache: SyncCache::new(kind, cache_bytes),
            peers: OnceCell::new(),
            flight: Flight::new(),
            keys: Mutex::new(HashMap::new()),
        });
        GROUPS.write().insert(name, group.clone());
        group
    }

    /// Returns the group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // == Peer Registration ==
    /// Registers the picker used to locate owner peers.
    ///
    /// # Panics
    /// Panics if called more than once; wiring a group to two pickers is a
    /// configuration error, caught at startup.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.peers.set(peers).is_err() {
            panic!("register_peers called more than once");
        }
    }

    // == Read Path ==
    /// Looks up `key`: hot tier, main tier, then a coalesced load.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(CacheError::KeyRequired);
        }

        if let Some(value) = self.hot_cache.get(key).await {
            info!(group = %self.name, key, "hit hotCache");
            return Ok(value);
        }

        if let Some(value) = self.main_cache.get(key).await {
            info!(group = %self.name, key, "hit");
            return Ok(value);
        }

        self.load(key).await
    }

    /// Loads a missing key once, however many callers are waiting on it.
    ///
    /// With a picker registered and a remote owner, the peer is tried first;
    /// any peer failure is logged and downgraded to a local load.
    async fn load(&self, key: &str) -> Result<ByteView> {
        self.flight
            .run(key, || async {
                if let Some(picker) = self.peers.get() {
                    if let Some(peer) = picker.pick_peer(key) {
                        match self.get_from_peer(peer.as_ref(), key).await {
                            Ok(value) => return Ok(value),
                            Err(err) => {
                                warn!(group = %self.name, key, "failed to get from peer: {err}");
                            }
                        }
                    }
                }
                self.get_locally(key).await
            })
            .await
    }

    /// Fetches from the owner peer and runs hot-promotion bookkeeping.
    ///
    /// Each successful remote fetch after the first bumps the key's count; at
    /// `count / max(1, round(elapsed_minutes)) >= MAX_MINUTE_REMOTE_QPS` the
    /// value enters the hot tier and the stats entry is dropped to reclaim
    /// memory.
    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let req = RpcRequest {
            group: self.name.clone(),
            key: key.to_string(),
        };
        let resp = peer.get(&req).await?;
        let value = ByteView::new(resp.value);

        let promote = {
            let mut keys = self.keys.lock();
            match keys.get_mut(key) {
                Some(stats) => {
                    stats.remote_count += 1;
                    let minutes = stats.first_fetch.elapsed().as_secs() as f64 / 60.0;
                    let buckets = minutes.round().max(1.0) as i64;
                    if stats.remote_count / buckets >= MAX_MINUTE_REMOTE_QPS {
                        keys.remove(key);
                        true
                    } else {
                        false
                    }
                }
                None => {
                    keys.insert(
                        key.to_string(),
                        KeyStats {
                            first_fetch: Instant::now(),
                            remote_count: 1,
                        },
                    );
                    false
                }
            }
        };

        if promote {
            self.hot_cache.add(key, value.clone()).await;
        }
        Ok(value)
    }

    /// Loads from the local data source and populates both tiers.
    ///
    /// Loader errors propagate to every coalesced caller and are never
    /// cached.
    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.loader.load(key)?;
        let value = ByteView::new(bytes);
        self.main_cache.add(key, value.clone()).await;
        self.hot_cache.add(key, value.clone()).await;
        Ok(value)
    }
}

// == Group Lookup ==
/// Returns the group registered under `name`, if any.
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    GROUPS.read().get(name).cloned()
}
