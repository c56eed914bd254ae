//! Purge trigger evaluation.

use crate::config::{CacheConfig, Trigger};
use crate::memory::MemoryProbe;

/// Returns `true` if the configured trigger condition holds.
///
/// | Trigger         | Fires when                                  |
/// |-----------------|---------------------------------------------|
/// | `RetainedCount` | `held > max_retained_objects`               |
/// | `MemoryBytes`   | `probe.used_bytes() > max_memory_bytes`     |
/// | `Disabled`      | never                                       |
pub fn trigger_fires(config: &CacheConfig, held: usize, probe: &dyn MemoryProbe) -> bool {
    match config.trigger {
        Trigger::RetainedCount => held > config.max_retained_objects,
        Trigger::MemoryBytes => probe.used_bytes() > config.max_memory_bytes,
        Trigger::Disabled => false,
    }
}
