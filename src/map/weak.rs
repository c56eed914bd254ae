//! Weak-reference identity map.
//!
//! Stores values by identity key without keeping them alive. Shared values
//! (`Arc<V>`) are stored as [`Weak`] observers; once every outside `Arc` is
//! gone the entry is dead and is removed the next time anything looks at it.
//! Owned values handed to [`insert_owned`](WeakIdentityMap::insert_owned) are
//! kept strongly and never die on their own.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                      WeakIdentityMap<K, V> Layout                           │
//! │                                                                             │
//! │   entries: OrderedMap<K, Entry<V>>   (insertion order)                      │
//! │                                                                             │
//! │     ┌────────┬──────────────────────┬──────────────────┐                    │
//! │     │  key   │ slot                 │ pin              │                    │
//! │     ├────────┼──────────────────────┼──────────────────┤                    │
//! │     │  "u1"  │ Weak(→ User#1)       │ None             │  live              │
//! │     │  "u2"  │ Weak(→ ✗)            │ None             │  dead, pruned      │
//! │     │  "u3"  │ Weak(→ User#3)       │ Some(Arc User#3) │  acquired          │
//! │     │  "cfg" │ Owned(Arc Config)    │ None             │  never reclaimed   │
//! │     └────────┴──────────────────────┴──────────────────┘                    │
//! │                                                                             │
//! │   cursor: snapshot ["u1","u2","u3","cfg"], Positioned / Exhausted           │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation   | Prunes dead entry | Diagnostic on miss |
//! |-------------|-------------------|--------------------|
//! | `get`       | yes               | `tracing::warn!`   |
//! | `contains`  | yes               | no                 |
//! | `iter`      | yes               | no                 |
//! | cursor ops  | yes               | no                 |
//! | `peek`      | no                | no                 |
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use identity_cache::map::WeakIdentityMap;
//!
//! let mut map = WeakIdentityMap::new();
//! let order = Arc::new(String::from("order #7"));
//! map.insert(7, &order);
//! assert!(map.contains(&7));
//!
//! // Pinning keeps the value alive without an outside reference
//! map.acquire(&7);
//! drop(order);
//! assert!(map.contains(&7));
//!
//! map.release(&7);
//! assert!(!map.contains(&7));
//! ```
//!
//! ## Thread Safety
//!
//! Not synchronized. Every read can prune, so even lookups need `&mut self`.
//! Use [`ConcurrentIdentityCache`](crate::concurrent::ConcurrentIdentityCache)
//! for shared access.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use crate::ds::OrderedMap;
use crate::error::InvariantError;
use crate::map::cursor::{Cursor, CursorState};
use crate::map::lookup::Lookup;
use crate::traits::CoreIdentityMap;

/// How an entry refers to its value.
#[derive(Debug)]
enum Slot<V> {
    Weak(Weak<V>),
    Owned(Arc<V>),
}

impl<V> Slot<V> {
    #[inline]
    fn upgrade(&self) -> Option<Arc<V>> {
        match self {
            Slot::Weak(weak) => weak.upgrade(),
            Slot::Owned(value) => Some(Arc::clone(value)),
        }
    }

    #[inline]
    fn is_live(&self) -> bool {
        match self {
            Slot::Weak(weak) => weak.strong_count() > 0,
            Slot::Owned(_) => true,
        }
    }

    fn points_to(&self, value: &Arc<V>) -> bool {
        match self {
            Slot::Weak(weak) => std::ptr::eq(weak.as_ptr(), Arc::as_ptr(value)),
            Slot::Owned(owned) => Arc::ptr_eq(owned, value),
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    slot: Slot<V>,
    pin: Option<Arc<V>>,
}

type Entries<K, V> = OrderedMap<K, Entry<V>>;

/// Returns the live value behind `key`, removing the entry if it is dead.
fn live_value<K, V>(entries: &mut Entries<K, V>, key: &K) -> Option<Arc<V>>
where
    K: Eq + Hash + Clone,
{
    let value = entries.get(key)?.slot.upgrade();
    if value.is_none() {
        entries.remove(key);
    }
    value
}

/// Returns `true` if `key` is present and live, removing it if dead.
fn validate<K, V>(entries: &mut Entries<K, V>, key: &K) -> bool
where
    K: Eq + Hash + Clone,
{
    let live = match entries.get(key) {
        Some(entry) => entry.slot.is_live(),
        None => return false,
    };
    if !live {
        entries.remove(key);
    }
    live
}

/// Identity map holding its values weakly.
///
/// # Type Parameters
///
/// - `K`: Identity key, `Eq + Hash + Clone + Debug` (`Debug` feeds the
///   miss diagnostic)
/// - `V`: Value type, shared through `Arc<V>`
pub struct WeakIdentityMap<K, V> {
    entries: Entries<K, V>,
    cursor: Cursor<K>,
}

impl<K, V> Default for WeakIdentityMap<K, V> {
    fn default() -> Self {
        Self {
            entries: OrderedMap::default(),
            cursor: Cursor::default(),
        }
    }
}

impl<K, V> WeakIdentityMap<K, V> {
    /// Number of stored entries, including dead ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }
}

impl<K, V> WeakIdentityMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: OrderedMap::with_capacity(capacity),
            cursor: Cursor::default(),
        }
    }

    /// Stores a weak observer of `value` under `key`.
    ///
    /// Overwriting keeps the key's position in iteration order. A pin on the
    /// key moves to the new value.
    pub fn insert(&mut self, key: K, value: &Arc<V>) {
        self.put(key, Slot::Weak(Arc::downgrade(value)), value);
    }

    /// Stores `value` directly. The map owns it until the key is removed.
    ///
    /// Returns a shared handle to the stored value.
    pub fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.put(key, Slot::Owned(Arc::clone(&value)), &value);
        value
    }

    fn put(&mut self, key: K, slot: Slot<V>, value: &Arc<V>) {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.slot = slot;
                if entry.pin.is_some() {
                    entry.pin = Some(Arc::clone(value));
                }
            },
            None => {
                self.entries.insert(key, Entry { slot, pin: None });
            },
        }
    }

    /// Reads the value stored under `key`.
    ///
    /// A missing or reclaimed key is a soft miss: the dead entry is removed,
    /// a warning is logged and [`Lookup::NotFound`] is returned.
    pub fn get(&mut self, key: &K) -> Lookup<V> {
        match live_value(&mut self.entries, key) {
            Some(value) => Lookup::Found(value),
            None => {
                tracing::warn!(key = ?key, "undefined identity key");
                Lookup::NotFound
            },
        }
    }

    /// Reads without pruning or logging.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).and_then(|entry| entry.slot.upgrade())
    }

    /// Returns `true` if `key` is present and its value is alive.
    ///
    /// Dead entries are removed silently.
    pub fn contains(&mut self, key: &K) -> bool {
        validate(&mut self.entries, key)
    }

    /// Removes `key` and any pin on it.
    ///
    /// Returns the value if it was still alive.
    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.entries
            .remove(key)
            .and_then(|entry| entry.slot.upgrade())
    }

    /// Pins `key`, keeping its value alive until [`release`](Self::release).
    ///
    /// Idempotent. Returns `false` (and does nothing) if the key is missing or
    /// dead.
    pub fn acquire(&mut self, key: &K) -> bool {
        let Some(value) = live_value(&mut self.entries, key) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.pin.is_none() {
                entry.pin = Some(value);
            }
        }
        true
    }

    /// Drops the pin on `key`. Returns `true` if a pin was dropped.
    pub fn release(&mut self, key: &K) -> bool {
        self.entries
            .get_mut(key)
            .and_then(|entry| entry.pin.take())
            .is_some()
    }

    /// Returns `true` if `key` is currently pinned.
    pub fn is_acquired(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.pin.is_some())
    }

    /// Live keys in insertion order. Dead entries are pruned.
    pub fn keys(&mut self) -> Vec<K> {
        self.prune();
        self.entries.keys().cloned().collect()
    }

    /// Removes every dead entry. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.slot.is_live());
        before - self.entries.len()
    }

    /// Removes everything, including pins, and resets the cursor.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor.reset();
    }

    /// Iterates over live `(key, value)` pairs in insertion order.
    ///
    /// The key order is captured up front; entries found dead along the way
    /// are removed.
    pub fn iter(&mut self) -> Iter<'_, K, V> {
        let keys: Vec<K> = self.entries.keys().cloned().collect();
        Iter {
            entries: &mut self.entries,
            keys: keys.into_iter(),
        }
    }

    // -- cursor ---------------------------------------------------------------

    /// Positions the cursor on the first live key, or exhausts it.
    pub fn rewind(&mut self) {
        let keys: Vec<K> = self.entries.keys().cloned().collect();
        let entries = &mut self.entries;
        self.cursor.rewind(keys, |key| validate(entries, key));
    }

    /// Moves the cursor to the next live key.
    pub fn advance(&mut self) {
        if !self.cursor.is_started() {
            self.rewind();
        }
        let entries = &mut self.entries;
        self.cursor.advance(|key| validate(entries, key));
    }

    /// Key under the cursor.
    pub fn key(&mut self) -> Option<&K> {
        if !self.cursor.is_started() {
            self.rewind();
        }
        self.cursor.key()
    }

    /// Value under the cursor.
    ///
    /// `None` when exhausted, or when the value died after the cursor moved
    /// onto it.
    pub fn current(&mut self) -> Option<Arc<V>> {
        if !self.cursor.is_started() {
            self.rewind();
        }
        let key = self.cursor.key()?;
        self.entries.get(key).and_then(|entry| entry.slot.upgrade())
    }

    /// Returns `true` while the cursor is positioned on a key.
    pub fn valid(&mut self) -> bool {
        if !self.cursor.is_started() {
            self.rewind();
        }
        self.cursor.state() == CursorState::Positioned
    }

    /// Validates pin bookkeeping.
    ///
    /// Every pin must be a strong reference to the value its entry observes.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (key, entry) in self.entries.iter() {
            if let Some(pin) = &entry.pin {
                if !entry.slot.points_to(pin) {
                    return Err(InvariantError::new(format!(
                        "pin on {:?} does not point to the stored value",
                        key
                    )));
                }
                if !entry.slot.is_live() {
                    return Err(InvariantError::new(format!(
                        "pinned entry {:?} is dead",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<K, V> fmt::Debug for WeakIdentityMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakIdentityMap")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor.state())
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`WeakIdentityMap::iter`].
pub struct Iter<'a, K, V> {
    entries: &'a mut Entries<K, V>,
    keys: std::vec::IntoIter<K>,
}

impl<K, V> Iterator for Iter<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = (K, Arc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            if let Some(value) = live_value(self.entries, &key) {
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

impl<K, V> CoreIdentityMap<K, V> for WeakIdentityMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    #[inline]
    fn get(&mut self, key: &K) -> Lookup<V> {
        WeakIdentityMap::get(self, key)
    }

    #[inline]
    fn insert(&mut self, key: K, value: &Arc<V>) {
        WeakIdentityMap::insert(self, key, value);
    }

    #[inline]
    fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        WeakIdentityMap::insert_owned(self, key, value)
    }

    #[inline]
    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        WeakIdentityMap::remove(self, key)
    }

    #[inline]
    fn contains(&mut self, key: &K) -> bool {
        WeakIdentityMap::contains(self, key)
    }

    fn keys(&mut self) -> Vec<K> {
        WeakIdentityMap::keys(self)
    }

    #[inline]
    fn acquire(&mut self, key: &K) -> bool {
        WeakIdentityMap::acquire(self, key)
    }

    #[inline]
    fn release(&mut self, key: &K) -> bool {
        WeakIdentityMap::release(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        WeakIdentityMap::len(self)
    }

    fn clear(&mut self) {
        WeakIdentityMap::clear(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRY_KEY: &str = "foo";

    mod basic_operations {
        use super::*;

        #[test]
        fn insert_and_get_same_instance() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(vec![1, 2, 3]);
            map.insert(TRY_KEY, &object);

            let found = map.get(&TRY_KEY).into_option().unwrap();
            assert!(Arc::ptr_eq(&found, &object));
        }

        #[test]
        fn remove_makes_key_absent() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(1u32);
            map.insert(TRY_KEY, &object);

            assert!(map.remove(&TRY_KEY).is_some());
            assert!(!map.contains(&TRY_KEY));
            assert!(map.remove(&TRY_KEY).is_none());
        }

        #[test]
        fn get_missing_key_is_soft_miss() {
            let mut map: WeakIdentityMap<&str, u32> = WeakIdentityMap::new();
            assert!(map.get(&"missing").is_not_found());
        }

        #[test]
        fn overwrite_keeps_position() {
            let mut map = WeakIdentityMap::new();
            let a = Arc::new('a');
            let b = Arc::new('b');
            let c = Arc::new('c');
            map.insert(1, &a);
            map.insert(2, &b);
            map.insert(1, &c);

            assert_eq!(map.keys(), vec![1, 2]);
            assert_eq!(*map.get(&1).into_option().unwrap(), 'c');
        }

        #[test]
        fn owned_values_are_never_reclaimed() {
            let mut map = WeakIdentityMap::new();
            let handle = map.insert_owned("answer", 42u64);
            drop(handle);

            assert!(map.contains(&"answer"));
            assert_eq!(map.get(&"answer").into_option().map(|v| *v), Some(42));
        }

        #[test]
        fn clear_empties_map_and_cursor() {
            let mut map = WeakIdentityMap::new();
            let v = Arc::new(1);
            map.insert(1, &v);
            map.acquire(&1);
            map.rewind();
            map.clear();

            assert!(map.is_empty());
            assert_eq!(map.cursor_state(), CursorState::NotStarted);
            assert!(!map.is_acquired(&1));
        }
    }

    mod weak_semantics {
        use super::*;

        #[test]
        fn dropping_last_reference_invalidates_entry() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(String::from("x"));
            map.insert(TRY_KEY, &object);
            drop(object);

            assert_eq!(map.len(), 1);
            assert!(!map.contains(&TRY_KEY));
            assert_eq!(map.len(), 0);
        }

        #[test]
        fn get_prunes_dead_entry() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(5u8);
            map.insert(1, &object);
            drop(object);

            assert!(map.get(&1).is_not_found());
            assert!(map.is_empty());
        }

        #[test]
        fn peek_does_not_prune() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(5u8);
            map.insert(1, &object);
            drop(object);

            assert!(map.peek(&1).is_none());
            assert_eq!(map.len(), 1);
        }

        #[test]
        fn prune_reports_removed_count() {
            let mut map = WeakIdentityMap::new();
            let keep = Arc::new(0);
            map.insert(0, &keep);
            for i in 1..=5 {
                let tmp = Arc::new(i);
                map.insert(i, &tmp);
            }

            assert_eq!(map.prune(), 5);
            assert_eq!(map.keys(), vec![0]);
        }
    }

    mod pinning {
        use super::*;

        #[test]
        fn acquire_keeps_value_alive_until_release() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(String::from("pinned"));
            map.insert(TRY_KEY, &object);
            assert!(map.acquire(&TRY_KEY));
            drop(object);

            assert!(map.contains(&TRY_KEY));
            assert_eq!(
                map.get(&TRY_KEY).into_option().as_deref().map(String::as_str),
                Some("pinned")
            );

            assert!(map.release(&TRY_KEY));
            assert!(!map.contains(&TRY_KEY));
        }

        #[test]
        fn acquire_and_release_are_idempotent() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(1);
            map.insert(1, &object);

            assert!(map.acquire(&1));
            assert!(map.acquire(&1));
            assert_eq!(Arc::strong_count(&object), 2);

            assert!(map.release(&1));
            assert!(!map.release(&1));
            assert_eq!(Arc::strong_count(&object), 1);
        }

        #[test]
        fn acquire_missing_or_dead_key_is_noop() {
            let mut map = WeakIdentityMap::new();
            assert!(!map.acquire(&1));

            let object = Arc::new(1);
            map.insert(1, &object);
            drop(object);
            assert!(!map.acquire(&1));
            assert!(!map.is_acquired(&1));
        }

        #[test]
        fn remove_releases_pin() {
            let mut map = WeakIdentityMap::new();
            let object = Arc::new(1);
            map.insert(1, &object);
            map.acquire(&1);
            map.remove(&1);

            assert_eq!(Arc::strong_count(&object), 1);
            assert!(!map.is_acquired(&1));
        }

        #[test]
        fn pin_follows_key_on_overwrite() {
            let mut map = WeakIdentityMap::new();
            let first = Arc::new(1);
            let second = Arc::new(2);
            map.insert(1, &first);
            map.acquire(&1);
            map.insert(1, &second);

            assert_eq!(Arc::strong_count(&first), 1);
            assert_eq!(Arc::strong_count(&second), 2);
            map.check_invariants().unwrap();
        }
    }

    mod iteration {
        use super::*;

        #[test]
        fn cursor_walks_live_entries_in_order() {
            let mut map = WeakIdentityMap::new();
            let values: Vec<_> = (0..4).map(Arc::new).collect();
            for (i, v) in values.iter().enumerate() {
                map.insert(i, v);
            }

            let mut seen = Vec::new();
            map.rewind();
            while map.valid() {
                let key = *map.key().unwrap();
                let value = map.current().unwrap();
                seen.push((key, *value));
                map.advance();
            }
            assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
            assert_eq!(map.cursor_state(), CursorState::Exhausted);
        }

        #[test]
        fn first_positional_call_rewinds() {
            let mut map = WeakIdentityMap::new();
            let v = Arc::new("v");
            map.insert("k", &v);

            assert_eq!(map.cursor_state(), CursorState::NotStarted);
            assert_eq!(map.key(), Some(&"k"));
            assert_eq!(map.cursor_state(), CursorState::Positioned);
        }

        #[test]
        fn cursor_skips_and_prunes_dead_entries() {
            let mut map = WeakIdentityMap::new();
            let a = Arc::new('a');
            let b = Arc::new('b');
            let c = Arc::new('c');
            map.insert(1, &a);
            map.insert(2, &b);
            map.insert(3, &c);
            drop(a);

            assert_eq!(map.key(), Some(&2));
            assert_eq!(map.len(), 2);

            drop(c);
            map.advance();
            assert!(!map.valid());
            assert_eq!(map.len(), 1);
        }

        #[test]
        fn cursor_is_restartable() {
            let mut map = WeakIdentityMap::new();
            let a = Arc::new(1);
            map.insert(1, &a);
            map.advance();
            assert!(!map.valid());

            let b = Arc::new(2);
            map.insert(2, &b);
            map.rewind();
            assert_eq!(map.key(), Some(&1));
        }

        #[test]
        fn empty_map_cursor_is_exhausted() {
            let mut map: WeakIdentityMap<u8, u8> = WeakIdentityMap::new();
            assert!(!map.valid());
            assert!(map.current().is_none());
            assert!(map.key().is_none());
        }

        #[test]
        fn iter_yields_live_pairs_and_prunes() {
            let mut map = WeakIdentityMap::new();
            let keep: Vec<_> = (0..3).map(Arc::new).collect();
            for (i, v) in keep.iter().enumerate() {
                map.insert(i * 2, v);
                let tmp = Arc::new(99);
                map.insert(i * 2 + 1, &tmp);
            }

            let pairs: Vec<(usize, i32)> = map.iter().map(|(k, v)| (k, *v)).collect();
            assert_eq!(pairs, vec![(0, 0), (2, 1), (4, 2)]);
            assert_eq!(map.len(), 3);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert(u8),
            InsertDropped(u8),
            Remove(u8),
            Acquire(u8),
            Release(u8),
            Contains(u8),
            Iterate,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..20).prop_map(Op::Insert),
                (0u8..20).prop_map(Op::InsertDropped),
                (0u8..20).prop_map(Op::Remove),
                (0u8..20).prop_map(Op::Acquire),
                (0u8..20).prop_map(Op::Release),
                (0u8..20).prop_map(Op::Contains),
                Just(Op::Iterate),
            ]
        }

        proptest! {
            #[cfg_attr(miri, ignore)]
            #[test]
            fn prop_pinned_or_referenced_entries_stay_live(
                ops in prop::collection::vec(op_strategy(), 0..120)
            ) {
                let mut map: WeakIdentityMap<u8, u8> = WeakIdentityMap::new();
                let mut outside: std::collections::HashMap<u8, Arc<u8>> = Default::default();
                for op in ops {
                    match op {
                        Op::Insert(k) => {
                            let v = Arc::new(k);
                            map.insert(k, &v);
                            outside.insert(k, v);
                        },
                        Op::InsertDropped(k) => {
                            let v = Arc::new(k);
                            map.insert(k, &v);
                            outside.remove(&k);
                        },
                        Op::Remove(k) => {
                            map.remove(&k);
                            outside.remove(&k);
                        },
                        Op::Acquire(k) => { map.acquire(&k); },
                        Op::Release(k) => { map.release(&k); },
                        Op::Contains(k) => { map.contains(&k); },
                        Op::Iterate => { let _ = map.iter().count(); },
                    }
                    map.check_invariants().unwrap();
                    for k in outside.keys() {
                        prop_assert!(map.contains(k));
                    }
                }
            }
        }
    }
}
