//! Deriving ordering keys from values.
//!
//! The set never hashes values: every value is mapped to a key with a total order, and two values
//! are the same member iff their keys are equal.

use core::fmt;
use core::marker::PhantomData;

/// Maps a value to its ordering key.
///
/// Returning `None` means the value has no place in the order (e.g. `NaN`); the set rejects such
/// values with [`Error::InvalidKey`](crate::Error::InvalidKey) instead of storing them.
pub trait KeyExtractor<T: ?Sized> {
    /// Key type. Its `Ord` must be a total order consistent with `Eq`.
    type Key: Ord;

    /// Derives the key of `value`.
    fn extract(&self, value: &T) -> Option<Self::Key>;
}

/// Orders values by their own `Ord` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Natural;

impl<T: Ord + Clone> KeyExtractor<T> for Natural {
    type Key = T;

    fn extract(&self, value: &T) -> Option<T> {
        Some(value.clone())
    }
}

/// Orders floating-point values by the IEEE 754 total order restricted to non-`NaN` values.
///
/// The mapping onto unsigned integers is injective, so `-0.0` and `+0.0` are distinct members
/// with `-0.0 < +0.0`. `NaN` has no key.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatKey;

impl KeyExtractor<f64> for FloatKey {
    type Key = u64;

    fn extract(&self, value: &f64) -> Option<u64> {
        if value.is_nan() {
            return None;
        }
        let bits = value.to_bits();
        Some(if bits >> 63 == 1 { !bits } else { bits | (1 << 63) })
    }
}

impl KeyExtractor<f32> for FloatKey {
    type Key = u32;

    fn extract(&self, value: &f32) -> Option<u32> {
        if value.is_nan() {
            return None;
        }
        let bits = value.to_bits();
        Some(if bits >> 31 == 1 { !bits } else { bits | (1 << 31) })
    }
}

/// Orders values by the key a function derives from them.
pub struct KeyFn<F, K> {
    f: F,
    _marker: PhantomData<fn() -> K>,
}

impl<F, K> KeyFn<F, K> {
    /// Wraps `f`. Values for which `f` returns `None` are rejected.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, K> fmt::Debug for KeyFn<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFn").finish_non_exhaustive()
    }
}

impl<T: ?Sized, K: Ord, F> KeyExtractor<T> for KeyFn<F, K>
where
    F: Fn(&T) -> Option<K>,
{
    type Key = K;

    fn extract(&self, value: &T) -> Option<K> {
        (self.f)(value)
    }
}

/// Key stored in a node. Variant order puts the head sentinel below and the tail sentinel above
/// every real key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeKey<K> {
    Min,
    Key(K),
    Max,
}
