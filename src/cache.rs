//! Shared memoization of decoded sub-assets for one batch run.
//!
//! Every table has its own locks, so work on trile sets never waits on textures. Within a table
//! a key gets a dedicated lock while its value is computed: concurrent callers for the same
//! missing key wait and then reuse the first successful result, callers for other keys proceed.
//! Entries are never evicted. A failed computation stores nothing and the next caller retries.

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::geometry::{Geometry, Texture};
use crate::trile_set::TrileSet;

pub struct CacheTable<K, V> {
    label: &'static str,
    values: Mutex<HashMap<K, Arc<V>>>,
    pending: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(label: &'static str) -> Self {
        Self { label, values: Mutex::new(HashMap::new()), pending: Mutex::new(HashMap::new()) }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.values.lock().get(key).cloned()
    }

    /// Returns the cached value for `key`, running `compute` on a miss.
    ///
    /// At most one `compute` per key runs at a time and a stored value is never recomputed.
    pub fn try_get_or_insert<E, F>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            trace!(table = self.label, key = ?key, "cache hit");
            return Ok(value);
        }

        let key_lock = self.pending.lock().entry(key.clone()).or_default().clone();
        let _computing = key_lock.lock();

        if let Some(value) = self.get(&key) {
            trace!(table = self.label, key = ?key, "cache hit after wait");
            return Ok(value);
        }

        debug!(table = self.label, key = ?key, "cache miss");
        let result = compute().map(Arc::new);
        let mut pending = self.pending.lock();
        match &result {
            Ok(value) => {
                self.values.lock().insert(key.clone(), Arc::clone(value));
                pending.remove(&key);
            }
            // Waiters still hold the lock and retry; the last one out removes it.
            Err(_) => {
                let ours = pending.get(&key).is_some_and(|lock| Arc::ptr_eq(lock, &key_lock));
                if ours && Arc::strong_count(&key_lock) == 2 {
                    pending.remove(&key);
                }
            }
        }
        result
    }

    pub fn get_or_insert<F>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_insert(key, || Ok::<V, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.values.lock().keys().cloned().collect()
    }
}

/// Every table is keyed by the normalized path the asset was resolved to.
pub struct AssetCache {
    trile_sets: CacheTable<String, TrileSet>,
    art_objects: CacheTable<String, Geometry>,
    textures: CacheTable<String, Texture>,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache {
    pub fn new() -> Self {
        Self {
            trile_sets: CacheTable::new("trile_sets"),
            art_objects: CacheTable::new("art_objects"),
            textures: CacheTable::new("textures"),
        }
    }

    pub fn trile_sets(&self) -> &CacheTable<String, TrileSet> {
        &self.trile_sets
    }

    pub fn art_objects(&self) -> &CacheTable<String, Geometry> {
        &self.art_objects
    }

    pub fn textures(&self) -> &CacheTable<String, Texture> {
        &self.textures
    }
}
