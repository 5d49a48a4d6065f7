//! LFU Engine
//!
//! Byte-bounded least-frequently-used map with per-entry expiry.
//!
//! Entries live in a `HashMap`; eviction order lives in a `BTreeMap` keyed by
//! `(frequency, tick)`, so the first key in the tree is always the victim.
//! Ticks come from a monotonically increasing counter and are reassigned on
//! every promotion, which makes them globally unique and gives equal-frequency
//! entries a least-recently-promoted tie-break.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::byteview::ByteView;
use crate::cache::{Clock, EvictionCallback};

struct LfuEntry {
    value: ByteView,
    expire: Option<Instant>,
    freq: u64,
    tick: u64,
}

// == LFU Cache ==
/// LFU cache engine. Not safe for concurrent access; the cache shell
/// serializes callers.
///
/// Same external contract as the LRU engine: byte accounting of
/// `key.len() + value.len()`, eager draining while over budget, expiry on
/// read, an optional eviction callback. `get` counts as an access and bumps
/// the entry's frequency; `add` on an existing key refreshes only the value
/// and expiry, leaving the frequency intact.
pub struct LfuCache {
    /// Byte capacity; `0` means unbounded
    max_bytes: i64,
    /// Bytes currently held, Σ key.len() + value.len()
    cur_bytes: i64,
    entries: HashMap<String, LfuEntry>,
    /// `(freq, tick) -> key`; first entry is the eviction victim
    queue: BTreeMap<(u64, u64), String>,
    /// Monotonic promotion counter
    tick: u64,
    /// Fired for every removal (eviction or expiry)
    on_evicted: Option<EvictionCallback>,
    /// Expiry clock, swappable for tests
    now: Clock,
}

impl LfuCache {
    // == Constructor ==
    /// Creates an LFU engine with the given byte capacity.
    pub fn new(max_bytes: i64, on_evicted: Option<EvictionCallback>) -> Self {
        Self {
            max_bytes,
            cur_bytes: 0,
            entries: HashMap::new(),
            queue: BTreeMap::new(),
            tick: 0,
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
    /// A new entry starts at frequency 1. Refreshing an existing key keeps
    /// its frequency and queue position. Afterwards, excess bytes are drained
    /// from the low-frequency end.
    pub fn add(&mut self, key: &str, value: ByteView, expire: Option<Instant>) {
        if let Some(entry) = self.entries.get_mut(key) {
            self.cur_bytes += value.len() as i64 - entry.value.len() as i64;
            entry.value = value;
            entry.expire = expire;
        } else {
            self.tick += 1;
            let tick = self.tick;
            self.cur_bytes += key.len() as i64 + value.len() as i64;
            self.entries.insert(
                key.to_string(),
                LfuEntry {
                    value,
                    expire,
                    freq: 1,
                    tick,
                },
            );
            self.queue.insert((1, tick), key.to_string());
        }
        while self.max_bytes != 0 && self.cur_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    // == Get ==
    /// Looks up a key, promoting it (frequency + 1, fresh tick) on a hit.
    ///
    /// An entry whose expiry has passed is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        let expired = {
            let entry = self.entries.get(key)?;
            entry.expire.is_some_and(|at| at < (self.now)())
        };
        if expired {
            self.remove(key);
            return None;
        }

        self.tick += 1;
        let tick = self.tick;
        let entry = self.entries.get_mut(key)?;
        self.queue.remove(&(entry.freq, entry.tick));
        entry.freq += 1;
        entry.tick = tick;
        self.queue.insert((entry.freq, entry.tick), key.to_string());
        Some(entry.value.clone())
    }

    // == Remove Oldest ==
    /// Removes the entry with the lowest `(frequency, tick)`. No-op when
    /// empty.
    pub fn remove_oldest(&mut self) {
        if let Some((_, key)) = self.queue.pop_first() {
            if let Some(entry) = self.entries.remove(&key) {
                self.cur_bytes -= key.len() as i64 + entry.value.len() as i64;
                if let Some(cb) = &self.on_evicted {
                    cb(&key, &entry.value);
                }
            }
        }
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the bytes currently accounted for.
    pub fn used_bytes(&self) -> i64 {
        self.cur_bytes
    }

    /// Removes a specific key, adjusting accounting and firing the eviction
    /// callback.
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.queue.remove(&(entry.freq, entry.tick));
            self.cur_bytes -= key.len() as i64 + entry.value.len() as i64;
            if let Some(cb) = &self.on_evicted {
                cb(key, &entry.value);
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn view(s: &str) -> ByteView {
        ByteView::new(s.as_bytes().to_vec())
    }

    fn manual_clock(cache: &mut LfuCache) -> (Arc<AtomicU64>, Instant) {
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
        let mut cache = LfuCache::new(0, None);
        cache.add("k", view("v"), None);
        assert_eq!(cache.get("k").unwrap().byte_slice(), b"v");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 2);
    }

    #[test]
    fn test_least_frequent_entry_is_evicted() {
        let mut cache = LfuCache::new(8, None);
        cache.add("a", view("11"), None); // 3 bytes
        cache.add("b", view("22"), None); // 3 bytes

        // "a" gets accessed, "b" does not: frequencies 2 vs 1.
        cache.get("a");

        cache.add("c", view("33"), None); // 9 > 8, victim is "b"
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_equal_frequency_evicts_least_recently_promoted() {
        let mut cache = LfuCache::new(0, None);
        cache.add("a", view("11"), None);
        cache.add("b", view("22"), None);

        // Both end up at frequency 2, but "a" was promoted after "b".
        cache.get("b");
        cache.get("a");

        cache.remove_oldest();
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_update_preserves_frequency() {
        let mut cache = LfuCache::new(8, None);
        cache.add("a", view("11"), None);
        cache.get("a");
        cache.get("a"); // freq 3

        cache.add("b", view("22"), None);
        // Refreshing "a" must not reset its frequency advantage.
        cache.add("a", view("44"), None);

        cache.add("c", view("33"), None); // victim must be "b" (freq 1)
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().byte_slice(), b"44");
    }

    #[test]
    fn test_update_existing_key_adjusts_bytes() {
        let mut cache = LfuCache::new(0, None);
        cache.add("k", view("v"), None);
        assert_eq!(cache.used_bytes(), 2);
        cache.add("k", view("longer"), None);
        assert_eq!(cache.used_bytes(), 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let mut cache = LfuCache::new(0, None);
        let (secs, base) = manual_clock(&mut cache);

        cache.add("k", view("v"), Some(base + Duration::from_secs(5)));

        secs.store(1, Ordering::SeqCst);
        assert_eq!(cache.get("k").unwrap().byte_slice(), b"v");

        secs.store(6, Ordering::SeqCst);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used_bytes(), 0);
        assert!(cache.queue.is_empty());
    }

    #[test]
    fn test_eviction_callback_fires() {
        let evicted: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
        let log = evicted.clone();
        let mut cache = LfuCache::new(
            4,
            Some(Box::new(move |key, _value| {
                log.lock().unwrap().push(key.to_string());
            })),
        );

        cache.add("a", view("1"), None);
        cache.add("b", view("2"), None); // 4 > 4 is false, both fit
        cache.add("c", view("3"), None); // drains "a"

        assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_remove_oldest_on_empty_is_noop() {
        let mut cache = LfuCache::new(0, None);
        cache.remove_oldest();
        assert!(cache.is_empty());
    }
}
