//! LRU Engine
//!
//! Byte-bounded least-recently-used map with per-entry expiry.
//!
//! Recency order lives in an index-arena doubly-linked list: nodes are stored
//! in a `Vec` and linked by index, with HEAD/TAIL sentinels, so moves and
//! removals are O(1) without raw pointers. Freed slots are recycled through a
//! free list.

use std::collections::HashMap;
use std::time::Instant;

use crate::byteview::ByteView;
use crate::cache::{Clock, EvictionCallback};

/// Sentinel indices in the `nodes` arena.
const HEAD: usize = 0; // most-recently-used end
const TAIL: usize = 1; // least-recently-used end
const NULL: usize = usize::MAX;

struct LruEntry {
    key: String,
    value: ByteView,
    expire: Option<Instant>,
}

struct Node {
    /// `None` only for the HEAD and TAIL sentinels and recycled slots.
    entry: Option<LruEntry>,
    /// Index toward HEAD (more recently used).
    prev: usize,
    /// Index toward TAIL (less recently used).
    next: usize,
}

// == LRU Cache ==
/// LRU cache engine. Not safe for concurrent access; the cache shell
/// serializes callers.
///
/// Size is accounted as `key.len() + value.len()` per entry. While the total
/// exceeds `max_bytes` (when nonzero), entries are drained from the
/// least-recently-used end; each removal fires the optional eviction
/// callback. Expired entries are removed on read.
pub struct LruCache {
    /// Byte capacity; `0` means unbounded
    max_bytes: i64,
    /// Bytes currently held, Σ key.len() + value.len()
    cur_bytes: i64,
    /// Index 0 = HEAD sentinel, 1 = TAIL sentinel, 2+ = entries
    nodes: Vec<Node>,
    /// Indices of freed (reusable) slots
    free_list: Vec<usize>,
    /// Maps a key to its index in `nodes`
    map: HashMap<String, usize>,
    /// Fired for every removal (eviction or expiry)
    on_evicted: Option<EvictionCallback>,
    /// Expiry clock, swappable for tests
    now: Clock,
}

impl LruCache {
    // == Constructor ==
    /// Creates an LRU engine with the given byte capacity.
    ///
    /// # Arguments
    /// * `max_bytes` - Byte budget for keys plus values; `0` disables the bound
    /// * `on_evicted` - Optional callback fired once per removed entry
    pub fn new(max_bytes: i64, on_evicted: Option<EvictionCallback>) -> Self {
        let nodes = vec![
            Node {
                entry: None,
                prev: NULL,
                next: TAIL,
            },
            Node {
                entry: None,
                prev: HEAD,
                next: NULL,
            },
        ];
        Self {
            max_bytes,
            cur_bytes: 0,
            nodes,
            free_list: Vec::new(),
            map: HashMap::new(),
            on_evicted,
            now: Box::new(Instant::now),
        }
    }

    /// Replaces the expiry clock.
    pub fn set_clock(&mut self, clock: Clock) {
        self.now = clock;
    }

    // == Add ==
    /// Inserts a value or refreshes an existing entry in place.
    ///
    /// Either way the entry becomes most recently used. Afterwards, excess
    /// bytes are drained from the LRU end.
    pub fn add(&mut self, key: &str, value: ByteView, expire: Option<Instant>) {
        if let Some(&idx) = self.map.get(key) {
            self.unlink(idx);
            self.link_after_head(idx);
            if let Some(entry) = self.nodes[idx].entry.as_mut() {
                self.cur_bytes += value.len() as i64 - entry.value.len() as i64;
                entry.value = value;
                entry.expire = expire;
            }
        } else {
            self.cur_bytes += key.len() as i64 + value.len() as i64;
            let idx = self.alloc_node(LruEntry {
                key: key.to_string(),
                value,
                expire,
            });
            self.map.insert(key.to_string(), idx);
            self.link_after_head(idx);
        }
        while self.max_bytes != 0 && self.cur_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    // == Get ==
    /// Looks up a key, promoting it to most recently used on a hit.
    ///
    /// An entry whose expiry has passed is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        let idx = *self.map.get(key)?;
        let expired = self.nodes[idx]
            .entry
            .as_ref()
            .is_some_and(|e| e.expire.is_some_and(|at| at < (self.now)()));
        if expired {
            self.remove_node(idx);
            return None;
        }
        self.unlink(idx);
        self.link_after_head(idx);
        self.nodes[idx].entry.as_ref().map(|e| e.value.clone())
    }

    // == Remove Oldest ==
    /// Removes the least-recently-used entry. No-op when empty.
    pub fn remove_oldest(&mut self) {
        let idx = self.nodes[TAIL].prev;
        if idx != HEAD {
            self.remove_node(idx);
        }
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the bytes currently accounted for.
    pub fn used_bytes(&self) -> i64 {
        self.cur_bytes
    }

    // == Internal List Plumbing ==
    /// Links `idx` immediately after the HEAD sentinel.
    fn link_after_head(&mut self, idx: usize) {
        let old_first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = old_first;
        self.nodes[HEAD].next = idx;
        self.nodes[old_first].prev = idx;
    }

    /// Detaches `idx` from its current position.
    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = NULL;
        self.nodes[idx].next = NULL;
    }

    /// Allocates a node slot, reusing from the free list when possible.
    fn alloc_node(&mut self, entry: LruEntry) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx].entry = Some(entry);
            self.nodes[idx].prev = NULL;
            self.nodes[idx].next = NULL;
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Node {
                entry: Some(entry),
                prev: NULL,
                next: NULL,
            });
            idx
        }
    }

    /// Unlinks and frees a node, adjusting accounting and firing the
    /// eviction callback.
    fn remove_node(&mut self, idx: usize) {
        self.unlink(idx);
        if let Some(entry) = self.nodes[idx].entry.take() {
            self.map.remove(&entry.key);
            self.cur_bytes -= entry.key.len() as i64 + entry.value.len() as i64;
            if let Some(cb) = &self.on_evicted {
                cb(&entry.key, &entry.value);
            }
        }
        self.free_list.push(idx);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn view(s: &str) -> ByteView {
        ByteView::new(s.as_bytes().to_vec())
    }

    /// Installs a clock driven by a shared seconds counter and returns the
    /// counter together with the test's time origin.
    fn manual_clock(cache: &mut LruCache) -> (Arc<AtomicU64>, Instant) {
        let base = Instant::now();
        let secs = Arc::new(AtomicU64::new(0));
        let handle = secs.clone();
        cache.set_clock(Box::new(move || {
            base + Duration::from_secs(handle.load(Ordering::SeqCst))
        }));
        (secs, base)
    }

    #[test]
    fn test_add_and_get() {
        let mut cache = LruCache::new(0, None);
        cache.add("k", view("v"), None);
        assert_eq!(cache.get("k").unwrap().byte_slice(), b"v");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_missing_key() {
        let mut cache = LruCache::new(0, None);
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        // Sizes: "a"+"1" = 2, "b"+"22" = 3, "c"+"333" = 4, "d"+"4444" = 5.
        let mut cache = LruCache::new(10, None);
        cache.add("a", view("1"), None);
        assert_eq!(cache.used_bytes(), 2);
        cache.add("b", view("22"), None);
        assert_eq!(cache.used_bytes(), 5);
        cache.add("c", view("333"), None);
        assert_eq!(cache.used_bytes(), 9);

        // 9 + 5 = 14 exceeds 10; "a" goes first, and 12 is still over, so
        // "b" follows.
        cache.add("d", view("4444"), None);
        assert_eq!(cache.used_bytes(), 9);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(7, None);
        cache.add("a", view("11"), None); // 3 bytes
        cache.add("b", view("22"), None); // 3 bytes

        // Touch "a" so "b" becomes the eviction victim.
        cache.get("a");
        cache.add("c", view("33"), None);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_update_existing_key_adjusts_bytes() {
        let mut cache = LruCache::new(0, None);
        cache.add("k", view("v"), None);
        assert_eq!(cache.used_bytes(), 2);
        cache.add("k", view("longer"), None);
        assert_eq!(cache.used_bytes(), 7);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().byte_slice(), b"longer");
    }

    #[test]
    fn test_update_counts_as_touch() {
        let mut cache = LruCache::new(8, None);
        cache.add("a", view("11"), None);
        cache.add("b", view("22"), None);
        cache.add("a", view("11"), None); // re-add touches "a"

        cache.add("c", view("33"), None); // over budget; victim must be "b"
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let mut cache = LruCache::new(0, None);
        let (secs, base) = manual_clock(&mut cache);

        cache.add("k", view("v"), Some(base + Duration::from_secs(5)));

        secs.store(1, Ordering::SeqCst);
        assert_eq!(cache.get("k").unwrap().byte_slice(), b"v");

        secs.store(6, Ordering::SeqCst);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_entry_valid_at_exact_expiry_instant() {
        let mut cache = LruCache::new(0, None);
        let (secs, base) = manual_clock(&mut cache);

        cache.add("k", view("v"), Some(base + Duration::from_secs(5)));
        secs.store(5, Ordering::SeqCst);
        // Expiry is strict: removed only once now is past the deadline.
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn test_eviction_callback_fires() {
        let evicted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log = evicted.clone();
        let mut cache = LruCache::new(
            4,
            Some(Box::new(move |key, _value| {
                log.lock().unwrap().push(key.to_string());
            })),
        );

        cache.add("a", view("1"), None);
        cache.add("b", view("2"), None);
        cache.add("c", view("3"), None); // 6 bytes against a budget of 4

        assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(cache.used_bytes(), 4);
    }

    #[test]
    fn test_remove_oldest_on_empty_is_noop() {
        let mut cache = LruCache::new(0, None);
        cache.remove_oldest();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_slot_reuse_after_eviction() {
        let mut cache = LruCache::new(4, None);
        for i in 0..20 {
            cache.add(&format!("k{i}"), view("v"), None);
        }
        // Capacity fits one (3-byte) entry at a time; the arena must not
        // grow a node per insertion.
        assert_eq!(cache.len(), 1);
        assert!(cache.nodes.len() < 10);
    }
}
