//! Thread-safe wrapper around [`IdentityCache`].
//!
//! Every read of the cache can prune entries and take holds, so lookups need
//! the write lock. Introspection (`config`, `held_len`, `is_held`, ...) only
//! takes the read lock.
//!
//! ```text
//!   thread A ──┐
//!   thread B ──┼──► Arc<RwLock<IdentityCache<K, V>>>
//!   thread C ──┘        write: get / insert / remove / gc / set_config
//!                       read:  config / len / held_len / check_invariants
//! ```
//!
//! Values are handed out as `Arc<V>`, so a value obtained on one thread stays
//! alive (and in the cache) while any thread still holds it.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::IdentityCache;
use crate::config::{CacheConfig, ConfigPatch};
use crate::error::{ConfigError, InvariantError};
use crate::map::Lookup;

/// Shared, lock-protected identity cache. Cloning shares the same cache.
pub struct ConcurrentIdentityCache<K, V> {
    inner: Arc<RwLock<IdentityCache<K, V>>>,
}

impl<K, V> Clone for ConcurrentIdentityCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentIdentityCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.read();
        f.debug_struct("ConcurrentIdentityCache")
            .field("len", &cache.len())
            .field("held", &cache.held_len())
            .finish_non_exhaustive()
    }
}

impl<K, V> Default for ConcurrentIdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> From<IdentityCache<K, V>> for ConcurrentIdentityCache<K, V> {
    fn from(cache: IdentityCache<K, V>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }
}

impl<K, V> ConcurrentIdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    /// Creates a shared cache with the default configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use identity_cache::concurrent::ConcurrentIdentityCache;
    ///
    /// let cache: ConcurrentIdentityCache<u64, String> = ConcurrentIdentityCache::new();
    /// let handle = cache.clone();
    /// std::thread::spawn(move || {
    ///     handle.insert_owned(1, "from thread".to_string());
    /// })
    /// .join()
    /// .unwrap();
    ///
    /// assert_eq!(cache.get(&1).into_option().as_deref().map(String::as_str), Some("from thread"));
    /// ```
    pub fn new() -> Self {
        IdentityCache::new().into()
    }

    /// Creates a shared cache with `patch` applied over the defaults.
    pub fn with_config(patch: &ConfigPatch) -> Result<Self, ConfigError> {
        IdentityCache::with_config(patch).map(Into::into)
    }

    pub fn get(&self, key: &K) -> Lookup<V> {
        self.inner.write().get(key)
    }

    pub fn insert(&self, key: K, value: &Arc<V>) {
        self.inner.write().insert(key, value);
    }

    pub fn insert_owned(&self, key: K, value: V) -> Arc<V> {
        self.inner.write().insert_owned(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.write().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.write().contains(key)
    }

    /// Live keys in insertion order, taken under one lock.
    pub fn keys(&self) -> Vec<K> {
        self.inner.write().keys()
    }

    /// Live entries in insertion order, taken under one lock.
    pub fn snapshot(&self) -> Vec<(K, Arc<V>)> {
        self.inner.write().iter().collect()
    }

    pub fn acquire(&self, key: &K) -> bool {
        self.inner.write().acquire(key)
    }

    pub fn release(&self, key: &K) -> bool {
        self.inner.write().release(key)
    }

    pub fn is_acquired(&self, key: &K) -> bool {
        self.inner.read().is_acquired(key)
    }

    pub fn gc(&self) -> usize {
        self.inner.write().gc()
    }

    pub fn purge(&self) -> usize {
        self.inner.write().purge()
    }

    pub fn trigger_condition(&self) -> bool {
        self.inner.read().trigger_condition()
    }

    pub fn set_config(&self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        self.inner.write().set_config(patch)
    }

    /// Copy of the effective configuration.
    pub fn config(&self) -> CacheConfig {
        self.inner.read().config().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn held_len(&self) -> usize {
        self.inner.read().held_len()
    }

    pub fn is_held(&self, key: &K) -> bool {
        self.inner.read().is_held(key)
    }

    pub fn prune(&self) -> usize {
        self.inner.write().prune()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Runs `f` with exclusive access, for compound operations that must not
    /// interleave with other threads (cursor walks, read-modify-write).
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut IdentityCache<K, V>) -> R) -> R {
        f(&mut *self.inner.write())
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.read().check_invariants()
    }
}
