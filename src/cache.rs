//! Evicting identity cache.
//!
//! [`IdentityCache`] wraps a [`WeakIdentityMap`] and keeps recently touched
//! values alive with a table of strong *holds*. When the configured trigger
//! fires, a purge pass drops a share of the holds; a value whose hold is
//! dropped disappears from the cache once nothing else references it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         IdentityCache<K, V>                                 │
//! │                                                                             │
//! │   map: WeakIdentityMap<K, V>        weak observers + pins                   │
//! │   holds: OrderedMap<K, Arc<V>>      strong retention, insertion order       │
//! │   popularity: PopularityTracker<K>  decayed scores of held keys             │
//! │   config: CacheConfig               trigger / strategy / limits             │
//! │   memory: Arc<dyn MemoryProbe>      process memory for the memory trigger   │
//! │                                                                             │
//! │   insert(k, v) ──► map.insert ──► hold(k) ──► popularity += 2 ──► gc()      │
//! │   get(k)       ──► map.get ──► hold(k) unless triggered ──► popularity += 1 │
//! │   gc()         ──► trigger? ──► purge(): drop ceil(held * pressure%) holds  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A read only adds a hold while the trigger is quiet, so a full cache does
//! not keep growing through reads. Writes always take a hold and then run
//! [`gc`](IdentityCache::gc).
//!
//! ## Purge strategies
//!
//! | Strategy     | Victims                                               |
//! |--------------|-------------------------------------------------------|
//! | `Random`     | uniformly random held keys                            |
//! | `Popularity` | lowest decayed popularity; ties keep hold order       |
//!
//! Writes count double for popularity, which favours fresh entries over keys
//! that were only read.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use identity_cache::cache::IdentityCache;
//! use identity_cache::config::{ConfigPatch, PurgeStrategy};
//!
//! let mut cache = IdentityCache::with_config(
//!     &ConfigPatch::new()
//!         .max_retained_objects(2)
//!         .purge_pressure_percent(50.0)
//!         .purge_strategy(PurgeStrategy::Popularity),
//! )
//! .unwrap();
//!
//! for id in 0..3u32 {
//!     cache.insert_owned(id, format!("row {id}"));
//! }
//! // The third insert went over the limit and dropped ceil(3 * 50%) holds.
//! assert_eq!(cache.held_len(), 1);
//! // Owned values stay in the map after losing their hold.
//! assert_eq!(cache.keys(), vec![0, 1, 2]);
//!
//! // A shared value is kept alive by its hold
//! let row = Arc::new(String::from("transient"));
//! cache.insert(10, &row);
//! drop(row);
//! assert!(cache.contains(&10));
//! ```
//!
//! ## Thread Safety
//!
//! Not synchronized; see
//! [`ConcurrentIdentityCache`](crate::concurrent::ConcurrentIdentityCache).

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::{CacheConfig, ConfigPatch, PurgeStrategy};
use crate::ds::{OrderedMap, PopularityTracker};
use crate::error::{ConfigError, InvariantError};
use crate::map::{CursorState, Iter, Lookup, WeakIdentityMap};
use crate::memory::{MemoryProbe, ProcessMemory};
use crate::policy::purge::{least_popular, random_victims, XorShift64};
use crate::policy::trigger_fires;
use crate::traits::{CollectableIdentityMap, CoreIdentityMap};

/// Popularity increments per write. Reads count one.
const INSERT_WEIGHT: usize = 2;

const DEFAULT_SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// Identity map with hold-based retention and purge policies.
pub struct IdentityCache<K, V> {
    map: WeakIdentityMap<K, V>,
    holds: OrderedMap<K, Arc<V>>,
    popularity: PopularityTracker<K>,
    config: CacheConfig,
    memory: Arc<dyn MemoryProbe>,
    rng: XorShift64,
}

impl<K, V> IdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates a cache with the default configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use identity_cache::cache::IdentityCache;
    /// use identity_cache::config::{PurgeStrategy, Trigger};
    ///
    /// let cache: IdentityCache<u64, String> = IdentityCache::new();
    /// assert_eq!(cache.config().trigger, Trigger::RetainedCount);
    /// assert_eq!(cache.config().purge_strategy, PurgeStrategy::Popularity);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_parts(
            CacheConfig::default(),
            Arc::new(ProcessMemory::new()),
            DEFAULT_SEED,
        )
    }

    /// Creates a cache with `patch` applied over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the merged configuration is invalid.
    pub fn with_config(patch: &ConfigPatch) -> Result<Self, ConfigError> {
        let config = patch.apply_to(&CacheConfig::default())?;
        Ok(Self::from_parts(
            config,
            Arc::new(ProcessMemory::new()),
            DEFAULT_SEED,
        ))
    }

    /// Assembles a cache from an already validated configuration.
    pub(crate) fn from_parts(config: CacheConfig, memory: Arc<dyn MemoryProbe>, seed: u64) -> Self {
        let decay_rate = config.popularity_decay_rate.unwrap_or_default();
        Self {
            map: WeakIdentityMap::new(),
            holds: OrderedMap::new(),
            popularity: PopularityTracker::new(decay_rate),
            config,
            memory,
            rng: XorShift64::new(seed),
        }
    }

    #[inline]
    fn tracks_popularity(&self) -> bool {
        self.config.purge_strategy == PurgeStrategy::Popularity
    }

    // -- reads and writes -----------------------------------------------------

    /// Reads `key`, taking a hold on the value if the trigger is quiet.
    ///
    /// A miss logs a warning and returns [`Lookup::NotFound`].
    pub fn get(&mut self, key: &K) -> Lookup<V> {
        let lookup = self.map.get(key);
        if let Lookup::Found(value) = &lookup {
            if !self.holds.contains_key(key) && !self.trigger_condition() {
                self.holds.insert(key.clone(), Arc::clone(value));
            }
            if self.tracks_popularity() && self.holds.contains_key(key) {
                self.popularity.increment(key);
            }
        }
        lookup
    }

    /// Stores a weak observer of `value`, holds it, and runs [`gc`](Self::gc).
    pub fn insert(&mut self, key: K, value: &Arc<V>) {
        self.map.insert(key.clone(), value);
        self.hold(key, Arc::clone(value));
    }

    /// Stores an owned value, holds it, and runs [`gc`](Self::gc).
    pub fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        let value = self.map.insert_owned(key.clone(), value);
        self.hold(key, Arc::clone(&value));
        value
    }

    fn hold(&mut self, key: K, value: Arc<V>) {
        if self.tracks_popularity() {
            for _ in 0..INSERT_WEIGHT {
                self.popularity.increment(&key);
            }
        }
        self.holds.insert(key, value);
        self.gc();
    }

    /// Removes `key` with its hold, pin and popularity record.
    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        let value = self.map.remove(key);
        self.holds.remove(key);
        self.popularity.remove(key);
        value
    }

    /// Returns `true` if `key` is present and alive. Never takes a hold.
    pub fn contains(&mut self, key: &K) -> bool {
        self.map.contains(key)
    }

    /// Live keys in insertion order.
    pub fn keys(&mut self) -> Vec<K> {
        self.map.keys()
    }

    /// Iterates over live entries without touching holds or popularity.
    pub fn iter(&mut self) -> Iter<'_, K, V> {
        self.map.iter()
    }

    /// Removes dead entries from the underlying map.
    pub fn prune(&mut self) -> usize {
        self.map.prune()
    }

    /// Drops every entry, hold, pin and popularity record.
    pub fn clear(&mut self) {
        self.map.clear();
        self.holds.clear();
        self.popularity.clear();
    }

    // -- pinning --------------------------------------------------------------

    pub fn acquire(&mut self, key: &K) -> bool {
        self.map.acquire(key)
    }

    pub fn release(&mut self, key: &K) -> bool {
        self.map.release(key)
    }

    pub fn is_acquired(&self, key: &K) -> bool {
        self.map.is_acquired(key)
    }

    // -- cursor ---------------------------------------------------------------

    pub fn rewind(&mut self) {
        self.map.rewind();
    }

    pub fn advance(&mut self) {
        self.map.advance();
    }

    pub fn key(&mut self) -> Option<&K> {
        self.map.key()
    }

    pub fn current(&mut self) -> Option<Arc<V>> {
        self.map.current()
    }

    pub fn valid(&mut self) -> bool {
        self.map.valid()
    }

    pub fn cursor_state(&self) -> CursorState {
        self.map.cursor_state()
    }

    // -- retention ------------------------------------------------------------

    /// Runs [`purge`](Self::purge) if the trigger condition holds.
    ///
    /// Returns the number of holds dropped.
    pub fn gc(&mut self) -> usize {
        if self.trigger_condition() {
            self.purge()
        } else {
            0
        }
    }

    /// Returns `true` if the configured trigger currently fires.
    pub fn trigger_condition(&self) -> bool {
        trigger_fires(&self.config, self.holds.len(), self.memory.as_ref())
    }

    /// Drops `ceil(held * pressure / 100)` holds chosen by the purge strategy.
    ///
    /// Map entries are left in place; a value goes away once no outside
    /// reference or pin remains.
    pub fn purge(&mut self) -> usize {
        let held = self.holds.len();
        let count = self.config.purge_count(held);
        if count == 0 {
            return 0;
        }

        // victims are positions in hold order
        let held_keys: Vec<K> = self.holds.keys().cloned().collect();
        let victims = match self.config.purge_strategy {
            PurgeStrategy::Random => random_victims(held, count, &mut self.rng),
            PurgeStrategy::Popularity => {
                let scores: Vec<f64> = held_keys
                    .iter()
                    .map(|key| {
                        self.popularity.decay(key);
                        self.popularity.score(key).unwrap_or(0.0)
                    })
                    .collect();
                least_popular(&scores, count)
            },
        };

        for position in victims {
            let key = &held_keys[position];
            self.holds.remove(key);
            self.popularity.remove(key);
        }

        tracing::debug!(
            strategy = %self.config.purge_strategy,
            dropped = count,
            held = self.holds.len(),
            "purged retention holds"
        );
        count
    }

    // -- configuration --------------------------------------------------------

    /// Merges `patch` into the configuration.
    ///
    /// The change is all-or-nothing: on error the previous configuration stays
    /// in effect. Leaving the popularity strategy discards all scores.
    pub fn set_config(&mut self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        let config = patch.apply_to(&self.config)?;
        if config.purge_strategy == PurgeStrategy::Popularity {
            if let Some(rate) = config.popularity_decay_rate {
                self.popularity.set_decay_rate(rate);
            }
        } else {
            self.popularity.clear();
        }
        tracing::debug!(
            trigger = %config.trigger,
            strategy = %config.purge_strategy,
            max_retained_objects = config.max_retained_objects,
            max_memory_bytes = config.max_memory_bytes,
            purge_pressure_percent = config.purge_pressure_percent,
            "identity cache reconfigured"
        );
        self.config = config;
        Ok(())
    }

    /// Effective configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // -- introspection --------------------------------------------------------

    pub fn is_held(&self, key: &K) -> bool {
        self.holds.contains_key(key)
    }

    /// Stored popularity score of `key` (decayed only as of the last purge).
    pub fn popularity(&self, key: &K) -> Option<f64> {
        self.popularity.score(key)
    }

    /// Validates holds, pins and popularity records against the map.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.map.check_invariants()?;
        for (key, held) in self.holds.iter() {
            match self.map.peek(key) {
                Some(stored) if Arc::ptr_eq(&stored, held) => {},
                Some(_) => {
                    return Err(InvariantError::new(format!(
                        "hold on {:?} does not match the stored value",
                        key
                    )));
                },
                None => {
                    return Err(InvariantError::new(format!(
                        "hold on {:?} has no live map entry",
                        key
                    )));
                },
            }
        }
        if !self.tracks_popularity() && !self.popularity.is_empty() {
            return Err(InvariantError::new(format!(
                "{} popularity records under the random strategy",
                self.popularity.len()
            )));
        }
        for key in self.popularity.keys() {
            if !self.holds.contains_key(key) {
                return Err(InvariantError::new(format!(
                    "popularity record for unheld key {:?}",
                    key
                )));
            }
        }
        Ok(())
    }
}

impl<K, V> IdentityCache<K, V> {
    /// Number of map entries, including dead ones not yet pruned.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of retention holds.
    pub fn held_len(&self) -> usize {
        self.holds.len()
    }
}

impl<K, V> Default for IdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for IdentityCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("len", &self.map.len())
            .field("held", &self.holds.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K, V> CoreIdentityMap<K, V> for IdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    #[inline]
    fn get(&mut self, key: &K) -> Lookup<V> {
        IdentityCache::get(self, key)
    }

    #[inline]
    fn insert(&mut self, key: K, value: &Arc<V>) {
        IdentityCache::insert(self, key, value);
    }

    #[inline]
    fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        IdentityCache::insert_owned(self, key, value)
    }

    #[inline]
    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        IdentityCache::remove(self, key)
    }

    #[inline]
    fn contains(&mut self, key: &K) -> bool {
        IdentityCache::contains(self, key)
    }

    fn keys(&mut self) -> Vec<K> {
        IdentityCache::keys(self)
    }

    #[inline]
    fn acquire(&mut self, key: &K) -> bool {
        IdentityCache::acquire(self, key)
    }

    #[inline]
    fn release(&mut self, key: &K) -> bool {
        IdentityCache::release(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        IdentityCache::len(self)
    }

    fn clear(&mut self) {
        IdentityCache::clear(self);
    }
}

impl<K, V> CollectableIdentityMap<K, V> for IdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    #[inline]
    fn gc(&mut self) -> usize {
        IdentityCache::gc(self)
    }
}
