//! Abstract data types.

use crate::error::Error;

/// Trait for a concurrent set.
///
/// Every method fails with [`Error::InvalidKey`] if the value has no key under the set's ordering.
pub trait ConcurrentSet<T> {
    /// Returns `true` iff the set contains the value.
    fn contains(&self, value: &T) -> Result<bool, Error>;

    /// Adds the value to the set. Returns whether the value was newly inserted.
    fn insert(&self, value: T) -> Result<bool, Error>;

    /// Removes the value from the set. Returns whether this call removed it.
    fn delete(&self, value: &T) -> Result<bool, Error>;
}
