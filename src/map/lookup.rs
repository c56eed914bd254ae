use std::sync::Arc;

/// Outcome of a direct read.
///
/// A miss is a normal result, not an error: the key was never stored, was
/// removed, or its value has been reclaimed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use identity_cache::map::{Lookup, WeakIdentityMap};
///
/// let mut map = WeakIdentityMap::new();
/// let user = Arc::new("alice");
/// map.insert(1, &user);
///
/// match map.get(&1) {
///     Lookup::Found(value) => assert_eq!(*value, "alice"),
///     Lookup::NotFound => unreachable!(),
/// }
/// assert!(map.get(&2).is_not_found());
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    Found(Arc<V>),
    NotFound,
}

impl<V> Lookup<V> {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    /// Borrows the found value.
    #[inline]
    pub fn found(&self) -> Option<&Arc<V>> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    #[inline]
    pub fn into_option(self) -> Option<Arc<V>> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

impl<V> From<Option<Arc<V>>> for Lookup<V> {
    fn from(value: Option<Arc<V>>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

impl<V> From<Lookup<V>> for Option<Arc<V>> {
    fn from(lookup: Lookup<V>) -> Self {
        lookup.into_option()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_round_trip_through_option() {
        let hit: Lookup<u32> = Some(Arc::new(3)).into();
        assert!(hit.is_found());
        assert_eq!(hit.found().map(|v| **v), Some(3));
        assert_eq!(Option::<Arc<u32>>::from(hit).map(|v| *v), Some(3));

        let miss: Lookup<u32> = None.into();
        assert!(miss.is_not_found());
        assert!(miss.into_option().is_none());
    }
}
