//! Write-once result memoization.
//!
//! One [`ResultCache`] per result kind, owned by the controller (no hidden
//! process-wide state). Entries never expire and are never individually
//! invalidated; [`ResultCache::clear`] is the only way to drop them, and it
//! drops everything.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

/// Keyed memoization with single-flight semantics for async producers.
///
/// For a given key the producer runs at most once for the process lifetime;
/// concurrent callers of [`get_or_fetch`](Self::get_or_fetch) for the same
/// uncached key await the one in-flight run instead of issuing their own.
/// A producer that fails caches nothing, so a later call may retry.
pub struct ResultCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for ResultCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<V>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Cached value for `key`, if one has been stored.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|cell| cell.get()).cloned()
    }

    /// Return the cached value for `key`, computing and storing it on the
    /// first call.
    pub fn get_or_compute(&self, key: &K, compute: impl FnOnce() -> V) -> V {
        let cell = self.cell(key);
        if let Some(value) = cell.get() {
            return value.clone();
        }
        let value = compute();
        // A concurrent winner keeps its entry; either way the cell now
        // holds the memoized value.
        let _ = cell.set(value.clone());
        cell.get().cloned().unwrap_or(value)
    }

    /// Async variant: concurrent callers for the same uncached key share
    /// one producer invocation. Errors are returned to every waiter and
    /// leave the cell empty.
    pub async fn get_or_fetch<E, Fut>(
        &self,
        key: &K,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(key);
        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Drop every entry. There is no partial invalidation.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of keys tracked (including ones with an in-flight producer).
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
