//! Cache configuration.
//!
//! [`CacheConfig`] is the effective, validated configuration of an
//! [`IdentityCache`](crate::cache::IdentityCache). Changes are expressed as a
//! [`ConfigPatch`]: only the fields that are set override the current values.
//!
//! ## Settings
//!
//! | Field                    | Type             | Default                        |
//! |--------------------------|------------------|--------------------------------|
//! | `trigger`                | [`Trigger`]      | `RetainedCount`                |
//! | `purge_strategy`         | [`PurgeStrategy`]| `Popularity`                   |
//! | `max_retained_objects`   | `usize`          | 1000                           |
//! | `max_memory_bytes`       | `u64`            | 64 MiB                         |
//! | `purge_pressure_percent` | `f64` in [0,100] | 10                             |
//! | `popularity_decay_rate`  | `f64` in (0,1)   | `solve_decay_rate(1000, 10000, 2)` |
//!
//! ## String-keyed configuration
//!
//! [`ConfigPatch::from_pairs`] accepts the historical option names, which is
//! handy when settings come from a config file or environment:
//!
//! | Key                  | Value                                           |
//! |----------------------|-------------------------------------------------|
//! | `trigger`            | `maxRetainedObjects`, `maxScriptMemory`, `none` |
//! | `maxRetainedObjects` | integer                                         |
//! | `maxScriptMemory`    | size string (`64M`, `512K`, `1G`, `1048576`)    |
//! | `purgePressure`      | number in [0, 100]                              |
//! | `purgeStrategy`      | `popularity`, `random`                          |
//! | `popularityDecay`    | number in (0, 1)                                |
//!
//! ## Example
//!
//! ```
//! use identity_cache::config::{CacheConfig, ConfigPatch, PurgeStrategy, Trigger};
//!
//! let config = ConfigPatch::new()
//!     .trigger(Trigger::MemoryBytes)
//!     .max_memory_bytes(128 * 1024 * 1024)
//!     .purge_strategy(PurgeStrategy::Random)
//!     .apply_to(&CacheConfig::default())
//!     .unwrap();
//! assert_eq!(config.trigger, Trigger::MemoryBytes);
//! assert_eq!(config.max_retained_objects, 1000);
//!
//! let from_file = ConfigPatch::from_pairs([
//!     ("trigger", "maxScriptMemory"),
//!     ("maxScriptMemory", "64M"),
//! ])
//! .unwrap();
//! assert_eq!(from_file.max_memory_bytes, Some(64 * 1024 * 1024));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::ds::popularity::solve_decay_rate;
use crate::error::ConfigError;

pub const DEFAULT_MAX_RETAINED_OBJECTS: usize = 1000;
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 64 * 1024 * 1024;
pub const DEFAULT_PURGE_PRESSURE_PERCENT: f64 = 10.0;

/// Parameters of the default decay rate: a popularity of 1000 falls to 2
/// after 10 000 other increments.
pub const DEFAULT_DECAY_INITIAL: f64 = 1000.0;
pub const DEFAULT_DECAY_ROUNDS: u64 = 10_000;
pub const DEFAULT_DECAY_TARGET: f64 = 2.0;

/// Returns the decay rate used when none is configured.
pub fn default_decay_rate() -> Option<f64> {
    solve_decay_rate(
        DEFAULT_DECAY_INITIAL,
        DEFAULT_DECAY_ROUNDS,
        DEFAULT_DECAY_TARGET,
    )
    .ok()
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Condition that starts a purge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Trigger {
    /// More holds than `max_retained_objects`.
    #[default]
    RetainedCount,
    /// Process memory usage above `max_memory_bytes`.
    MemoryBytes,
    /// Never purge automatically.
    Disabled,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::RetainedCount => "maxRetainedObjects",
            Trigger::MemoryBytes => "maxScriptMemory",
            Trigger::Disabled => "none",
        }
    }
}

impl FromStr for Trigger {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maxRetainedObjects" | "retained_count" => Ok(Trigger::RetainedCount),
            "maxScriptMemory" | "memory_bytes" => Ok(Trigger::MemoryBytes),
            "none" => Ok(Trigger::Disabled),
            other => Err(ConfigError::new(format!("unknown gc trigger: {other}"))),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PurgeStrategy
// ---------------------------------------------------------------------------

/// How a purge pass picks the holds to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PurgeStrategy {
    /// Uniformly random victims.
    Random,
    /// Lowest decayed popularity first.
    #[default]
    Popularity,
}

impl PurgeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeStrategy::Random => "random",
            PurgeStrategy::Popularity => "popularity",
        }
    }
}

impl FromStr for PurgeStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(PurgeStrategy::Random),
            "popularity" => Ok(PurgeStrategy::Popularity),
            other => Err(ConfigError::new(format!("unknown purge strategy: {other}"))),
        }
    }
}

impl fmt::Display for PurgeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Effective cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub trigger: Trigger,
    pub purge_strategy: PurgeStrategy,
    pub max_retained_objects: usize,
    pub max_memory_bytes: u64,
    pub purge_pressure_percent: f64,
    /// Per-tick popularity decay. Always set while the strategy is
    /// `Popularity`.
    pub popularity_decay_rate: Option<f64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            trigger: Trigger::default(),
            purge_strategy: PurgeStrategy::default(),
            max_retained_objects: DEFAULT_MAX_RETAINED_OBJECTS,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            purge_pressure_percent: DEFAULT_PURGE_PRESSURE_PERCENT,
            popularity_decay_rate: default_decay_rate(),
        }
    }
}

impl CacheConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pressure = self.purge_pressure_percent;
        if !(0.0..=100.0).contains(&pressure) {
            return Err(ConfigError::new(format!(
                "purge pressure must be within [0, 100], got {pressure}"
            )));
        }
        if let Some(rate) = self.popularity_decay_rate {
            if !(rate > 0.0 && rate < 1.0) {
                return Err(ConfigError::new(format!(
                    "popularity decay rate must be within (0, 1), got {rate}"
                )));
            }
        }
        if self.purge_strategy == PurgeStrategy::Popularity && self.popularity_decay_rate.is_none()
        {
            return Err(ConfigError::new(
                "popularity purge strategy requires a decay rate",
            ));
        }
        Ok(())
    }

    /// Number of holds a purge pass drops out of `held`.
    ///
    /// `ceil(held * pressure / 100)`, never more than `held`.
    pub fn purge_count(&self, held: usize) -> usize {
        let count = (held as f64 * self.purge_pressure_percent / 100.0).ceil();
        (count as usize).min(held)
    }
}

// ---------------------------------------------------------------------------
// ConfigPatch
// ---------------------------------------------------------------------------

/// Partial configuration merged over the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub trigger: Option<Trigger>,
    pub purge_strategy: Option<PurgeStrategy>,
    pub max_retained_objects: Option<usize>,
    pub max_memory_bytes: Option<u64>,
    pub purge_pressure_percent: Option<f64>,
    pub popularity_decay_rate: Option<f64>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn purge_strategy(mut self, strategy: PurgeStrategy) -> Self {
        self.purge_strategy = Some(strategy);
        self
    }

    pub fn max_retained_objects(mut self, max: usize) -> Self {
        self.max_retained_objects = Some(max);
        self
    }

    pub fn max_memory_bytes(mut self, max: u64) -> Self {
        self.max_memory_bytes = Some(max);
        self
    }

    pub fn purge_pressure_percent(mut self, percent: f64) -> Self {
        self.purge_pressure_percent = Some(percent);
        self
    }

    pub fn popularity_decay_rate(mut self, rate: f64) -> Self {
        self.popularity_decay_rate = Some(rate);
        self
    }

    /// Builds a patch from string key/value pairs.
    ///
    /// # Errors
    ///
    /// Unknown keys, unknown trigger/strategy names and unparsable numbers.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut patch = Self::new();
        for (key, value) in pairs {
            let value = value.trim();
            match key {
                "trigger" => patch.trigger = Some(value.parse()?),
                "purgeStrategy" => patch.purge_strategy = Some(value.parse()?),
                "maxRetainedObjects" => {
                    patch.max_retained_objects = Some(value.parse().map_err(|_| {
                        ConfigError::new(format!("invalid maxRetainedObjects: {value}"))
                    })?);
                },
                "maxScriptMemory" => {
                    patch.max_memory_bytes = Some(parse_size(value).ok_or_else(|| {
                        ConfigError::new(format!("invalid maxScriptMemory: {value}"))
                    })?);
                },
                "purgePressure" => {
                    patch.purge_pressure_percent = Some(parse_number(key, value)?);
                },
                "popularityDecay" => {
                    patch.popularity_decay_rate = Some(parse_number(key, value)?);
                },
                other => {
                    return Err(ConfigError::new(format!("unknown config option: {other}")));
                },
            }
        }
        Ok(patch)
    }

    /// Merges this patch over `base` and validates the result.
    ///
    /// Switching to the popularity strategy without a decay rate derives the
    /// default one.
    pub fn apply_to(&self, base: &CacheConfig) -> Result<CacheConfig, ConfigError> {
        let mut config = base.clone();
        if let Some(trigger) = self.trigger {
            config.trigger = trigger;
        }
        if let Some(strategy) = self.purge_strategy {
            config.purge_strategy = strategy;
        }
        if let Some(max) = self.max_retained_objects {
            config.max_retained_objects = max;
        }
        if let Some(max) = self.max_memory_bytes {
            config.max_memory_bytes = max;
        }
        if let Some(percent) = self.purge_pressure_percent {
            config.purge_pressure_percent = percent;
        }
        if let Some(rate) = self.popularity_decay_rate {
            config.popularity_decay_rate = Some(rate);
        }
        if config.purge_strategy == PurgeStrategy::Popularity
            && config.popularity_decay_rate.is_none()
        {
            config.popularity_decay_rate = Some(solve_decay_rate(
                DEFAULT_DECAY_INITIAL,
                DEFAULT_DECAY_ROUNDS,
                DEFAULT_DECAY_TARGET,
            )?);
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse::<f64>()
        .map_err(|_| ConfigError::new(format!("invalid {key}: {value}")))
}

// ---------------------------------------------------------------------------
// Size strings
// ---------------------------------------------------------------------------

/// Reads a `maxScriptMemory` value such as `"64M"` or `"1.5 GB"` as bytes.
///
/// The unit is everything from the first letter on: none or `b` for bytes,
/// `k`/`kb`, `m`/`mb` or `g`/`gb` for binary multiples, in any case. Negative
/// and non-numeric amounts yield `None`.
///
/// ```
/// use identity_cache::config::parse_size;
///
/// assert_eq!(parse_size("64M"), Some(64 << 20));
/// assert_eq!(parse_size("1.5 GB"), Some(3 << 29));
/// assert_eq!(parse_size("-1"), None);
/// ```
#[must_use]
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    let unit_start = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (amount, unit) = text.split_at(unit_start);

    let shift = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" => 10,
        "m" | "mb" => 20,
        "g" | "gb" => 30,
        _ => return None,
    };
    let amount: f64 = amount.trim_end().parse().ok()?;
    if amount.is_sign_negative() {
        return None;
    }

    // `as` saturates, so oversized amounts clamp to u64::MAX
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bytes = (amount * (1u64 << shift) as f64) as u64;
    Some(bytes)
}
