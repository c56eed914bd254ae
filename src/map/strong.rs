//! Strong fallback map.
//!
//! Same contract as [`WeakIdentityMap`](crate::map::WeakIdentityMap) but every
//! value is held strongly, so nothing is ever reclaimed behind the caller's
//! back. Pinning and collection are no-ops.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::ds::OrderedMap;
use crate::map::Lookup;
use crate::traits::{CollectableIdentityMap, CoreIdentityMap};

/// Insertion-ordered map of strong references.
pub struct StrongIdentityMap<K, V> {
    entries: OrderedMap<K, Arc<V>>,
}

impl<K, V> Default for StrongIdentityMap<K, V> {
    fn default() -> Self {
        Self {
            entries: OrderedMap::default(),
        }
    }
}

impl<K, V> StrongIdentityMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> + '_ {
        self.entries.iter()
    }
}

impl<K, V> CoreIdentityMap<K, V> for StrongIdentityMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn get(&mut self, key: &K) -> Lookup<V> {
        match self.entries.get(key) {
            Some(value) => Lookup::Found(Arc::clone(value)),
            None => {
                tracing::warn!(key = ?key, "undefined identity key");
                Lookup::NotFound
            },
        }
    }

    fn insert(&mut self, key: K, value: &Arc<V>) {
        self.entries.insert(key, Arc::clone(value));
    }

    fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.entries.remove(key)
    }

    fn contains(&mut self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn keys(&mut self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    fn acquire(&mut self, _key: &K) -> bool {
        false
    }

    fn release(&mut self, _key: &K) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> CollectableIdentityMap<K, V> for StrongIdentityMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn gc(&mut self) -> usize {
        0
    }
}

impl<K, V> fmt::Debug for StrongIdentityMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongIdentityMap")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
