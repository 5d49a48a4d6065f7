//! Byte View Module
//!
//! Immutable view over a cached payload, with an optional expiry instant.

use std::time::Instant;

use bytes::Bytes;

// == Byte View ==
/// An immutable view of cached bytes.
///
/// Cloning is cheap (reference-counted); the payload itself is never mutated
/// after construction. Anything that hands bytes out of the cache goes
/// through [`ByteView::byte_slice`], which returns a fresh copy so callers
/// never hold a mutating handle into stored data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteView {
    bytes: Bytes,
    expire: Option<Instant>,
}

impl ByteView {
    // == Constructors ==
    /// Creates a view that never expires.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            expire: None,
        }
    }

    /// Creates a view that expires at the given instant.
    pub fn with_expire(bytes: impl Into<Bytes>, expire: Instant) -> Self {
        Self {
            bytes: bytes.into(),
            expire: Some(expire),
        }
    }

    // == Accessors ==
    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the expiry instant, or `None` if the view never expires.
    pub fn expire(&self) -> Option<Instant> {
        self.expire
    }

    /// Returns a copy of the payload as a byte vector.
    ///
    /// The copy is defensive: mutating the returned vector has no effect on
    /// the cached data.
    pub fn byte_slice(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Returns the payload decoded as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
