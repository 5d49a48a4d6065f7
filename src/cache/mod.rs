//! Cache Module
//!
//! Byte-bounded eviction engines (LRU and LFU) with per-entry expiry, and the
//! thread-safe shell that a group mounts one of them behind.

mod lfu;
mod lru;


pub use lfu::LfuCache;
pub use lru::LruCache;

use std::str::FromStr;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::byteview::ByteView;
use crate::error::CacheError;

// == Shared Engine Types ==
/// Injectable clock used by the engines for expiry checks.
///
/// Defaults to `Instant::now`; tests substitute a controlled clock to drive
/// expiry deterministically.
pub type Clock = Box<dyn Fn() -> Instant + Send + Sync>;

/// Callback fired for every entry removed by capacity pressure or expiry.
pub type EvictionCallback = Box<dyn Fn(&str, &ByteView) + Send + Sync>;

// == Cache Kind ==
/// Selects which eviction engine a cache shell constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Lru,
    Lfu,
}

impl FromStr for CacheKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lru" => Ok(CacheKind::Lru),
            "lfu" => Ok(CacheKind::Lfu),
            other => Err(CacheError::Config(format!("unknown cache kind: {other}"))),
        }
    }
}

// == Engine ==
/// Tagged union over the two eviction engines.
///
/// Both engines share the same capability set the read path needs: `add` and
/// `get`. Neither is concurrency-safe on its own; [`SyncCache`] serializes
/// access.
pub enum Engine {
    Lru(LruCache),
    Lfu(LfuCache),
}

impl Engine {
    fn new(kind: CacheKind, max_bytes: i64) -> Self {
        match kind {
            CacheKind::Lru => Engine::Lru(LruCache::new(max_bytes, None)),
            CacheKind::Lfu => Engine::Lfu(LfuCache::new(max_bytes, None)),
        }
    }

    fn add(&mut self, key: &str, value: ByteView) {
        let expire = value.expire();
        match self {
            Engine::Lru(c) => c.add(key, value, expire),
            Engine::Lfu(c) => c.add(key, value, expire),
        }
    }

    fn get(&mut self, key: &str) -> Option<ByteView> {
        match self {
            Engine::Lru(c) => c.get(key),
            Engine::Lfu(c) => c.get(key),
        }
    }
}

// == Thread-Safe Cache Shell ==
/// Reader/writer-locked wrapper around an eviction engine.
///
/// The engine is constructed lazily on the first `add`: a group creates two
/// shells (main and hot) and either may never be touched, so allocation waits
/// until use. A `get` first checks engine absence under the read lock; an
/// actual lookup reorders recency/frequency state and therefore runs under
/// the write lock.
pub struct SyncCache {
    kind: CacheKind,
    max_bytes: i64,
    engine: RwLock<Option<Engine>>,
}

impl SyncCache {
    /// Creates an empty shell. `max_bytes == 0` means unbounded.
    pub fn new(kind: CacheKind, max_bytes: i64) -> Self {
        Self {
            kind,
            max_bytes,
            engine: RwLock::new(None),
        }
    }

    /// Inserts or refreshes a value, constructing the engine on first use.
    pub async fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.engine.write().await;
        guard
            .get_or_insert_with(|| Engine::new(self.kind, self.max_bytes))
            .add(key, value);
    }

    /// Looks up a key; absent engine means an unconditional miss.
    pub async fn get(&self, key: &str) -> Option<ByteView> {
        if self.engine.read().await.is_none() {
            return None;
        }
        let mut guard = self.engine.write().await;
        (*guard).as_mut()?.get(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_on_untouched_shell_is_a_miss() {
        let cache = SyncCache::new(CacheKind::Lru, 1024);
        assert!(cache.get("anything").await.is_none());
        // Still no engine allocated.
        assert!(cache.engine.read().await.is_none());
    }

    #[tokio::test]
    async fn test_add_constructs_engine_lazily() {
        let cache = SyncCache::new(CacheKind::Lru, 1024);
        cache.add("k", ByteView::new(b"v".as_slice())).await;
        assert!(cache.engine.read().await.is_some());
        assert_eq!(cache.get("k").await.unwrap().byte_slice(), b"v");
    }

    #[tokio::test]
    async fn test_lfu_shell_roundtrip() {
        let cache = SyncCache::new(CacheKind::Lfu, 1024);
        cache.add("k", ByteView::new(b"v".as_slice())).await;
        assert_eq!(cache.get("k").await.unwrap().byte_slice(), b"v");
    }

    #[tokio::test]
    async fn test_concurrent_adds_and_gets() {
        let cache = Arc::new(SyncCache::new(CacheKind::Lru, 0));
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("key{i}");
                cache.add(&key, ByteView::new(format!("val{i}"))).await;
                cache.get(&key).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let got = handle.await.unwrap();
            assert_eq!(got.unwrap().byte_slice(), format!("val{i}").into_bytes());
        }
    }

    #[test]
    fn test_cache_kind_parsing() {
        assert_eq!("lru".parse::<CacheKind>().unwrap(), CacheKind::Lru);
        assert_eq!("lfu".parse::<CacheKind>().unwrap(), CacheKind::Lfu);
        assert!("arc".parse::<CacheKind>().is_err());
    }
}
