//! Cache builder and backend selection.
//!
//! [`IdentityCacheBuilder`] collects a configuration patch, a memory probe and
//! a purge seed, validates the configuration once, and produces either an
//! [`IdentityCache`] or a backend-erased [`AnyIdentityCache`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use identity_cache::builder::{Backend, IdentityCacheBuilder};
//! use identity_cache::config::{ConfigPatch, PurgeStrategy};
//! use identity_cache::memory::FixedMemory;
//! use identity_cache::traits::CoreIdentityMap;
//!
//! let mut cache = IdentityCacheBuilder::new()
//!     .config(ConfigPatch::new().purge_strategy(PurgeStrategy::Random))
//!     .memory_probe(Arc::new(FixedMemory::new(0)))
//!     .seed(7)
//!     .build::<u64, String>()
//!     .unwrap();
//! cache.insert_owned(1, "hello".to_string());
//! assert!(cache.get(&1).is_found());
//!
//! let mut any = IdentityCacheBuilder::new()
//!     .build_backend::<u64, String>(Backend::detect())
//!     .unwrap();
//! assert_eq!(any.backend(), Backend::Weak);
//! any.insert_owned(1, "hello".to_string());
//! assert_eq!(any.len(), 1);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::IdentityCache;
use crate::config::{CacheConfig, ConfigPatch};
use crate::error::ConfigError;
use crate::map::{Lookup, StrongIdentityMap};
use crate::memory::{MemoryProbe, ProcessMemory};
use crate::traits::{CollectableIdentityMap, CoreIdentityMap};

const DEFAULT_SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// Storage backend for [`AnyIdentityCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Weak observers with hold-based retention and purging.
    Weak,
    /// Strong references only. Nothing is reclaimed or purged.
    Strong,
}

impl Backend {
    /// Backend to use on this platform.
    ///
    /// `std::sync::Weak` is always available, so this is [`Backend::Weak`].
    pub fn detect() -> Self {
        Backend::Weak
    }
}

/// Builder for identity caches.
#[derive(Clone)]
pub struct IdentityCacheBuilder {
    patch: ConfigPatch,
    memory: Option<Arc<dyn MemoryProbe>>,
    seed: u64,
}

impl Default for IdentityCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityCacheBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCacheBuilder")
            .field("patch", &self.patch)
            .field("custom_memory_probe", &self.memory.is_some())
            .field("seed", &self.seed)
            .finish()
    }
}

impl IdentityCacheBuilder {
    pub fn new() -> Self {
        Self {
            patch: ConfigPatch::new(),
            memory: None,
            seed: DEFAULT_SEED,
        }
    }

    /// Configuration applied over the defaults at build time.
    pub fn config(mut self, patch: ConfigPatch) -> Self {
        self.patch = patch;
        self
    }

    /// Probe for the memory trigger. Defaults to [`ProcessMemory`].
    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = Some(probe);
        self
    }

    /// Seed for random purge victim selection.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn resolve(&self) -> Result<CacheConfig, ConfigError> {
        self.patch.apply_to(&CacheConfig::default())
    }

    /// Builds an evicting [`IdentityCache`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the patch yields an invalid configuration.
    pub fn build<K, V>(&self) -> Result<IdentityCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + fmt::Debug,
    {
        let config = self.resolve()?;
        let memory = match &self.memory {
            Some(probe) => Arc::clone(probe),
            None => Arc::new(ProcessMemory::new()),
        };
        tracing::debug!(
            trigger = %config.trigger,
            strategy = %config.purge_strategy,
            seed = self.seed,
            "building identity cache"
        );
        Ok(IdentityCache::from_parts(config, memory, self.seed))
    }

    /// Builds a cache on the chosen backend.
    ///
    /// The configuration is validated for both backends, although the strong
    /// backend never purges.
    pub fn build_backend<K, V>(&self, backend: Backend) -> Result<AnyIdentityCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + fmt::Debug,
    {
        match backend {
            Backend::Weak => self.build().map(|cache| AnyIdentityCache {
                inner: AnyInner::Weak(cache),
            }),
            Backend::Strong => {
                self.resolve()?;
                tracing::debug!("building strong fallback identity map");
                Ok(AnyIdentityCache {
                    inner: AnyInner::Strong(StrongIdentityMap::new()),
                })
            },
        }
    }
}

/// Identity cache on either backend, behind one API.
pub struct AnyIdentityCache<K, V> {
    inner: AnyInner<K, V>,
}

enum AnyInner<K, V> {
    Weak(IdentityCache<K, V>),
    Strong(StrongIdentityMap<K, V>),
}

impl<K, V> AnyIdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn backend(&self) -> Backend {
        match &self.inner {
            AnyInner::Weak(_) => Backend::Weak,
            AnyInner::Strong(_) => Backend::Strong,
        }
    }

    /// The evicting cache, if this is the weak backend.
    pub fn as_identity_cache(&mut self) -> Option<&mut IdentityCache<K, V>> {
        match &mut self.inner {
            AnyInner::Weak(cache) => Some(cache),
            AnyInner::Strong(_) => None,
        }
    }
}

impl<K, V> CoreIdentityMap<K, V> for AnyIdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn get(&mut self, key: &K) -> Lookup<V> {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.get(key),
            AnyInner::Strong(map) => map.get(key),
        }
    }

    fn insert(&mut self, key: K, value: &Arc<V>) {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.insert(key, value),
            AnyInner::Strong(map) => map.insert(key, value),
        }
    }

    fn insert_owned(&mut self, key: K, value: V) -> Arc<V> {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.insert_owned(key, value),
            AnyInner::Strong(map) => map.insert_owned(key, value),
        }
    }

    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.remove(key),
            AnyInner::Strong(map) => map.remove(key),
        }
    }

    fn contains(&mut self, key: &K) -> bool {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.contains(key),
            AnyInner::Strong(map) => map.contains(key),
        }
    }

    fn keys(&mut self) -> Vec<K> {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.keys(),
            AnyInner::Strong(map) => map.keys(),
        }
    }

    fn acquire(&mut self, key: &K) -> bool {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.acquire(key),
            AnyInner::Strong(map) => map.acquire(key),
        }
    }

    fn release(&mut self, key: &K) -> bool {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.release(key),
            AnyInner::Strong(map) => map.release(key),
        }
    }

    fn len(&self) -> usize {
        match &self.inner {
            AnyInner::Weak(cache) => cache.len(),
            AnyInner::Strong(map) => map.len(),
        }
    }

    fn clear(&mut self) {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.clear(),
            AnyInner::Strong(map) => map.clear(),
        }
    }
}

impl<K, V> CollectableIdentityMap<K, V> for AnyIdentityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn gc(&mut self) -> usize {
        match &mut self.inner {
            AnyInner::Weak(cache) => cache.gc(),
            AnyInner::Strong(map) => map.gc(),
        }
    }
}

impl<K, V> fmt::Debug for AnyIdentityCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            AnyInner::Weak(cache) => f.debug_tuple("AnyIdentityCache::Weak").field(cache).finish(),
            AnyInner::Strong(map) => f.debug_tuple("AnyIdentityCache::Strong").field(map).finish(),
        }
    }
}
