//! Consistent-Hash Ring
//!
//! Maps a key to the address of its owner peer. Each real peer appears on the
//! ring as `replicas` virtual nodes to smooth the distribution.

use std::collections::HashMap;

/// Hash function mapping bytes to a 32-bit ring position.
pub type HashFn = fn(&[u8]) -> u32;

// == Hash Ring ==
/// Consistent-hash ring with virtual nodes.
///
/// The ring slice stays sorted, so lookups are a binary search. If two
/// virtual hashes collide, the later insertion overwrites the earlier
/// mapping; at CRC32 scale collisions are rare enough that this is accepted
/// as a known limitation.
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    ring: Vec<u32>,
    /// Virtual-node hash -> real peer address
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring using CRC32-IEEE as the hash.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32fast::hash)
    }

    /// Creates an empty ring with an injected hash, used by tests to make
    /// placement deterministic.
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    // == Add ==
    /// Adds peers to the ring.
    ///
    /// Each peer contributes `replicas` virtual nodes hashed from the decimal
    /// replica index concatenated with the peer address. The ring is
    /// re-sorted once after all insertions.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let h = (self.hash)(format!("{i}{peer}").as_bytes());
                self.ring.push(h);
                self.nodes.insert(h, peer.to_string());
            }
        }
        self.ring.sort_unstable();
    }

    // == Get ==
    /// Returns the peer owning `key`, or `None` if the ring is empty.
    ///
    /// The owner is the first virtual node clockwise from the key's hash,
    /// wrapping to the start of the ring past the last position.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let h = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&pos| pos < h) % self.ring.len();
        self.nodes.get(&self.ring[idx]).map(String::as_str)
    }

    /// Returns the number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns true when no peers have been added.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
