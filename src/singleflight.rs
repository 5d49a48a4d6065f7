//! Single-Flight Coalescer
//!
//! Deduplicates concurrent loads by key: however many callers ask for the
//! same key at once, the loader runs exactly once and every caller observes
//! the same result.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{CacheError, Result};

/// Senders parked on an in-flight call, waiting for the leader's result.
type Waiters<T> = Vec<oneshot::Sender<Result<T>>>;

// == Flight ==
/// Per-key load coalescer.
///
/// A key is present in `calls` exactly while a load for it is executing. The
/// first caller for a key (the leader) installs an empty waiter list, runs
/// the future outside the lock, then removes the record and hands a clone of
/// the result to every caller that arrived in the meantime. The record is
/// gone before the leader returns, so a later call starts a fresh load
/// rather than replaying a stale result.
pub struct Flight<T> {
    calls: Mutex<HashMap<String, Waiters<T>>>,
}

impl<T: Clone> Flight<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `make()` for `key`, unless a call for the same key is already in
    /// flight — in that case the caller blocks on the in-flight call and
    /// receives its result, error included, verbatim.
    ///
    /// The lock over the call map is held only to insert or remove records,
    /// never while the future executes.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let rx = {
            let mut calls = self.calls.lock();
            match calls.get_mut(key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    calls.insert(key.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = rx {
            return match rx.await {
                Ok(result) => result,
                // The leader went away without delivering (dropped mid-poll).
                Err(_) => Err(CacheError::Internal("in-flight load abandoned".into())),
            };
        }

        let result = make().await;

        let waiters = self.calls.lock().remove(key).unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
        result
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}
