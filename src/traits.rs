//! # Identity Map Traits
//!
//! Common read/write/pin contract shared by every backend, so callers can be
//! written once and run against the weak map, the evicting cache, or the
//! strong fallback.
//!
//! ```text
//!   ┌──────────────────────────────────────────┐
//!   │          CoreIdentityMap<K, V>           │
//!   │                                          │
//!   │  get(&mut, &K) → Lookup<V>               │
//!   │  insert(&mut, K, &Arc<V>)                │
//!   │  insert_owned(&mut, K, V) → Arc<V>       │
//!   │  remove(&mut, &K) → Option<Arc<V>>       │
//!   │  contains(&mut, &K) → bool               │
//!   │  keys(&mut) → Vec<K>                     │
//!   │  acquire / release(&mut, &K) → bool      │
//!   │  len / is_empty / clear                  │
//!   └────────────────────┬─────────────────────┘
//!                        │
//!                        ▼
//!   ┌──────────────────────────────────────────┐
//!   │      CollectableIdentityMap<K, V>        │
//!   │                                          │
//!   │  gc(&mut) → usize                        │
//!   └──────────────────────────────────────────┘
//! ```
//!
//! | Implementor          | Core | Collectable | Weak storage |
//! |----------------------|------|-------------|--------------|
//! | `WeakIdentityMap`    | ✅   | ❌          | ✅           |
//! | `IdentityCache`      | ✅   | ✅          | ✅           |
//! | `StrongIdentityMap`  | ✅   | ✅ (no-op)  | ❌           |
//! | `AnyIdentityCache`   | ✅   | ✅          | per backend  |
//!
//! Reads take `&mut self` because weak backends prune dead entries on access.

use std::sync::Arc;

use crate::map::Lookup;

/// Operations every identity map supports.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use identity_cache::map::{StrongIdentityMap, WeakIdentityMap};
/// use identity_cache::traits::CoreIdentityMap;
///
/// fn load<M: CoreIdentityMap<u64, String>>(map: &mut M, rows: &[Arc<String>]) {
///     for (id, row) in rows.iter().enumerate() {
///         map.insert(id as u64, row);
///     }
/// }
///
/// let rows = vec![Arc::new("a".to_string()), Arc::new("b".to_string())];
///
/// let mut weak = WeakIdentityMap::new();
/// load(&mut weak, &rows);
/// assert!(CoreIdentityMap::contains(&mut weak, &1));
///
/// let mut strong = StrongIdentityMap::new();
/// load(&mut strong, &rows);
/// assert_eq!(CoreIdentityMap::len(&strong), 2);
/// ```
pub trait CoreIdentityMap<K, V> {
    /// Reads the value under `key`; a miss is [`Lookup::NotFound`].
    fn get(&mut self, key: &K) -> Lookup<V>;

    /// Stores a shared value.
    fn insert(&mut self, key: K, value: &Arc<V>);

    /// Stores a value the map owns outright.
    fn insert_owned(&mut self, key: K, value: V) -> Arc<V>;

    /// Removes `key`, returning its value if it was alive.
    fn remove(&mut self, key: &K) -> Option<Arc<V>>;

    /// Returns `true` if `key` is present and alive.
    fn contains(&mut self, key: &K) -> bool;

    /// Live keys in insertion order.
    fn keys(&mut self) -> Vec<K>;

    /// Pins `key`. Returns whether the key is now pinned.
    fn acquire(&mut self, key: &K) -> bool;

    /// Unpins `key`. Returns whether a pin was dropped.
    fn release(&mut self, key: &K) -> bool;

    /// Number of stored entries (weak backends may count dead ones).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

/// Identity maps with a retention policy that can be run on demand.
pub trait CollectableIdentityMap<K, V>: CoreIdentityMap<K, V> {
    /// Runs a purge pass if the trigger condition holds.
    ///
    /// Returns the number of retention holds dropped.
    fn gc(&mut self) -> usize;
}
