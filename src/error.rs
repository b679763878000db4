//! Error types.

use thiserror::Error;

/// Errors returned by [`SkipListSet`](crate::SkipListSet) construction and operations.
///
/// Losing a compare-and-swap race is never an error; operations retry internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The key extractor could not derive an ordering key from the value.
    #[error("value has no valid ordering key")]
    InvalidKey,

    /// The configured maximum height is below 1.
    #[error("maximum height must be at least 1, got {0}")]
    InvalidMaxHeight(usize),
}

/// A structural defect found by [`SkipListSet::check_invariants`](crate::SkipListSet::check_invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Two adjacent nodes at `level` are not in strictly increasing key order.
    #[error("keys at level {level} are not strictly increasing")]
    UnorderedLevel {
        /// Offending level.
        level: usize,
    },

    /// A node is linked at `level` although its height is lower.
    #[error("node linked at level {level} above its height")]
    HeightExceeded {
        /// Offending level.
        level: usize,
    },

    /// The walk of `level` ended somewhere other than the tail sentinel.
    #[error("level {level} does not end at the tail sentinel")]
    MissingTail {
        /// Offending level.
        level: usize,
    },

    /// An unmarked node at `level` is absent from level 0.
    #[error("unmarked node at level {level} is missing from level 0")]
    NotInBaseLevel {
        /// Offending level.
        level: usize,
    },
}
