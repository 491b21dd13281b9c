//! Keyed query cache
//!
//! Concurrent requests with identical parameters share one in-flight future
//! and its result. [`LatestIntent`] drops results of queries that were
//! superseded by a newer request.

use crate::error::SwapError;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub type SharedResult<V> = Result<V, Arc<SwapError>>;

type SharedQuery<V> = Shared<BoxFuture<'static, SharedResult<V>>>;

struct Cached<V: Clone> {
    query: SharedQuery<V>,
    created: Instant,
}

fn start<V, F, Fut>(fetch: F) -> SharedQuery<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, SwapError>> + Send + 'static,
{
    fetch().map(|r| r.map_err(Arc::new)).boxed().shared()
}

/// Memoizes async queries by request key
pub struct QueryCache<K, V: Clone> {
    entries: DashMap<K, Cached<V>>,
    ttl: Duration,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached or in-flight result for `key`, running `fetch` only on a miss
    ///
    /// Failed queries are evicted so the next call retries. A miss also
    /// drops every other expired, settled entry.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> SharedResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, SwapError>> + Send + 'static,
    {
        if !self.entries.contains_key(&key) {
            self.purge_expired();
        }

        let query = match self.entries.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                let stale = occupied.get().created.elapsed() > self.ttl
                    && occupied.get().query.peek().is_some();
                if stale {
                    debug!("Cache entry for {:?} expired", key);
                    let query = start(fetch);
                    occupied.insert(Cached {
                        query: query.clone(),
                        created: Instant::now(),
                    });
                    query
                } else {
                    occupied.get().query.clone()
                }
            }
            MapEntry::Vacant(vacant) => {
                let query = start(fetch);
                vacant.insert(Cached {
                    query: query.clone(),
                    created: Instant::now(),
                });
                query
            }
        };

        let result = query.clone().await;
        if result.is_err() {
            // A refresh may already have replaced the failed query
            self.entries
                .remove_if(&key, |_, cached| cached.query.ptr_eq(&query));
        }
        result
    }

    /// Drop expired entries whose query has finished
    pub fn purge_expired(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, cached| cached.created.elapsed() <= self.ttl || cached.query.peek().is_none());
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracks the most recent request so stale responses can be discarded
pub struct LatestIntent<K, V> {
    generation: AtomicU64,
    current: Mutex<Option<(u64, K, Option<V>)>>,
}

/// Handle of one request registered with [`LatestIntent::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent(u64);

impl<K: PartialEq + Clone, V: Clone> LatestIntent<K, V> {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Register `key` as the latest request
    pub fn begin(&self, key: K) -> Intent {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut current) = self.current.lock() {
            *current = Some((generation, key, None));
        }
        Intent(generation)
    }

    /// Store `value` if `intent` is still the latest request; returns whether it was kept
    pub fn publish(&self, intent: Intent, value: V) -> bool {
        let Ok(mut current) = self.current.lock() else {
            return false;
        };
        match current.as_mut() {
            Some((generation, _, slot)) if *generation == intent.0 => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Latest request key and its result, once published
    pub fn current(&self) -> Option<(K, Option<V>)> {
        let current = self.current.lock().ok()?;
        current.as_ref().map(|(_, key, value)| (key.clone(), value.clone()))
    }
}

impl<K: PartialEq + Clone, V: Clone> Default for LatestIntent<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
