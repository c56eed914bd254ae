//! Canonical identity token.
//!
//! Maps and caches are generic over any `Eq + Hash + Clone + Debug` key, but
//! most callers key records by a numeric id or a string id. [`IdentityKey`]
//! covers both without any implicit coercion: `IdentityKey::Int(1)` and
//! `IdentityKey::from("1")` are distinct keys, and there are no conversions
//! from `bool` or floating point values.

use std::fmt;

/// Integer or string identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Int(i64),
    Str(String),
}

impl IdentityKey {
    /// Returns the integer id, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            IdentityKey::Int(id) => Some(*id),
            IdentityKey::Str(_) => None,
        }
    }

    /// Returns the string id, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            IdentityKey::Int(_) => None,
            IdentityKey::Str(id) => Some(id),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Int(id) => write!(f, "{id}"),
            IdentityKey::Str(id) => f.write_str(id),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for IdentityKey {
                #[inline]
                fn from(id: $ty) -> Self {
                    IdentityKey::Int(i64::from(id))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for IdentityKey {
    #[inline]
    fn from(id: &str) -> Self {
        IdentityKey::Str(id.to_owned())
    }
}

impl From<String> for IdentityKey {
    #[inline]
    fn from(id: String) -> Self {
        IdentityKey::Str(id)
    }
}
