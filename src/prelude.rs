pub use crate::builder::{AnyIdentityCache, Backend, IdentityCacheBuilder};
pub use crate::cache::IdentityCache;
#[cfg(feature = "concurrency")]
pub use crate::concurrent::ConcurrentIdentityCache;
pub use crate::config::{CacheConfig, ConfigPatch, PurgeStrategy, Trigger};
pub use crate::ds::{solve_decay_rate, PopularityTracker};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::key::IdentityKey;
pub use crate::map::{CursorState, Lookup, StrongIdentityMap, WeakIdentityMap};
pub use crate::memory::{FixedMemory, MemoryProbe, ProcessMemory};
pub use crate::traits::{CollectableIdentityMap, CoreIdentityMap};
