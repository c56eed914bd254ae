//! Insertion-ordered hash map with lazy order deletion.
//!
//! Removing a key from the middle of an ordered map is usually O(n). Here the
//! authoritative `entries` map carries a sequence number per key and the
//! `order` log keeps `(seq, key)` pairs in insertion order. Removal only
//! touches the map; the log entry goes stale and is skipped on iteration. The
//! log is compacted once it holds more than twice as many records as there
//! are live keys, so removal is amortized O(1).
//!
//! ## Architecture
//!
//! ```text
//!   entries: FxHashMap<K, (seq, V)>          order: Vec<(seq, K)>
//!   ┌──────┬─────┬───────┐                   ┌─────┬──────┐
//!   │ "a"  │  0  │  va   │                   │  0  │ "a"  │  live
//!   │ "c"  │  2  │  vc   │                   │  1  │ "b"  │  stale (removed)
//!   │ "b"  │  3  │  vb'  │                   │  2  │ "c"  │  live
//!   └──────┴─────┴───────┘                   │  3  │ "b"  │  live (re-inserted)
//!                                            └─────┴──────┘
//!   keys() → "a", "c", "b"
//! ```
//!
//! Overwriting an existing key keeps its sequence number, and with it its
//! position. A key that is removed and inserted again moves to the end.
//!
//! ## Example
//!
//! ```
//! use identity_cache::ds::OrderedMap;
//!
//! let mut map = OrderedMap::new();
//! map.insert("a", 1);
//! map.insert("b", 2);
//! map.insert("c", 3);
//! map.remove(&"b");
//! map.insert("b", 4);
//! map.insert("a", 10);
//!
//! let pairs: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
//! assert_eq!(pairs, vec![("a", 10), ("c", 3), ("b", 4)]);
//! ```

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Log records below this size are never compacted.
const COMPACT_MIN: usize = 64;

struct Slot<V> {
    seq: u64,
    value: V,
}

/// Hash map that iterates in insertion order.
pub struct OrderedMap<K, V> {
    entries: FxHashMap<K, Slot<V>>,
    order: Vec<(u64, K)>,
    next_seq: u64,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            order: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<K, V> OrderedMap<K, V> {
    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the order log, stale records included.
    pub fn order_len(&self) -> usize {
        self.order.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            order: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Inserts or overwrites. Overwriting keeps the key's position.
    ///
    /// Returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.entries.get_mut(&key) {
            return Some(std::mem::replace(&mut slot.value, value));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push((seq, key.clone()));
        self.entries.insert(key, Slot { seq, value });
        None
    }

    /// Removes `key`. Amortized O(1).
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.maybe_compact();
        Some(slot.value)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, slot| keep(key, &mut slot.value));
        if self.entries.len() != before {
            self.compact();
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order.iter().filter_map(move |(seq, key)| {
            self.entries
                .get_key_value(key)
                .filter(|(_, slot)| slot.seq == *seq)
                .map(|(key, slot)| (key, &slot.value))
        })
    }

    fn maybe_compact(&mut self) {
        if self.order.len() > COMPACT_MIN && self.order.len() > self.entries.len() * 2 {
            self.compact();
        }
    }

    /// Drops stale records from the order log.
    fn compact(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(seq, key)| entries.get(key).is_some_and(|slot| slot.seq == *seq));
    }
}

impl<K, V> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap")
            .field("len", &self.entries.len())
            .field("order_len", &self.order.len())
            .finish_non_exhaustive()
    }
}
