//! identity-cache: weak-reference identity maps with hold-based eviction.
//!
//! An identity map hands out the same `Arc<V>` for a key for as long as the
//! value is alive. [`IdentityCache`] keeps recently used values alive with
//! retention holds and drops a share of them when the count or memory trigger
//! fires.
//!
//! ```
//! use std::sync::Arc;
//! use identity_cache::prelude::*;
//!
//! let mut cache: IdentityCache<IdentityKey, String> = IdentityCache::new();
//! let user = Arc::new(String::from("ada"));
//! cache.insert("user:1".into(), &user);
//!
//! let again = cache.get(&"user:1".into()).into_option().unwrap();
//! assert!(Arc::ptr_eq(&user, &again));
//! ```

pub mod builder;
pub mod cache;
#[cfg(feature = "concurrency")]
pub mod concurrent;
pub mod config;
pub mod ds;
pub mod error;
pub mod key;
pub mod map;
pub mod memory;
pub mod policy;
pub mod prelude;
pub mod traits;

pub use crate::builder::{AnyIdentityCache, Backend, IdentityCacheBuilder};
pub use crate::cache::IdentityCache;
#[cfg(feature = "concurrency")]
pub use crate::concurrent::ConcurrentIdentityCache;
pub use crate::config::{CacheConfig, ConfigPatch, PurgeStrategy, Trigger};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::key::IdentityKey;
pub use crate::map::{Lookup, StrongIdentityMap, WeakIdentityMap};
