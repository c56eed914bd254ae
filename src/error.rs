//! Errors raised by the identity cache.
//!
//! Both types wrap a human-readable message. Nothing in the cache panics on
//! bad input; rejected values surface as one of these instead.
//!
//! | Type               | Raised by                                              |
//! |--------------------|--------------------------------------------------------|
//! | [`ConfigError`]    | `set_config`, `ConfigPatch::from_pairs`, builders, `solve_decay_rate` |
//! | [`InvariantError`] | `check_invariants` on maps and caches                  |
//!
//! ```
//! use identity_cache::config::ConfigPatch;
//!
//! let err = ConfigPatch::from_pairs([("trigger", "sometimes")]).unwrap_err();
//! assert!(err.message().starts_with("unknown gc trigger"));
//! ```

use std::fmt;

/// Declares a message-carrying error type with `new`, `message`, `Display`
/// and `std::error::Error`.
macro_rules! message_error {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn new(message: impl Into<String>) -> Self {
                Self(message.into())
            }

            #[inline]
            pub fn message(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::error::Error for $name {}
    };
}

message_error! {
    /// A configuration value or decay-solver argument was rejected.
    ///
    /// The previous configuration of a cache stays in effect when this is
    /// returned from [`IdentityCache::set_config`](crate::cache::IdentityCache::set_config).
    ///
    /// ```
    /// use identity_cache::ds::popularity::solve_decay_rate;
    ///
    /// let err = solve_decay_rate(1000.0, 0, 2.0).unwrap_err();
    /// assert_eq!(err.to_string(), "rounds must be > 0");
    /// ```
    ConfigError
}

message_error! {
    /// Holds, pins or popularity records disagree with the stored entries.
    InvariantError
}
