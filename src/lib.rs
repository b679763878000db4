//! Lock-free concurrent skip list set.
//!
//! [`SkipListSet`] supports lock-free `insert`, `delete` and `contains` from any number of threads.
//! Nodes are ordered by a key derived from each value through a [`KeyExtractor`], and memory of
//! unlinked nodes is reclaimed with `crossbeam-epoch`.
//!
//! ```
//! use lockfree_skiplist::SkipListSet;
//!
//! let set = SkipListSet::new();
//! assert_eq!(set.insert(5), Ok(true));
//! assert_eq!(set.insert(5), Ok(false));
//! assert_eq!(set.contains(&5), Ok(true));
//! assert_eq!(set.delete(&5), Ok(true));
//! assert_eq!(set.contains(&5), Ok(false));
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![deny(unsafe_op_in_unsafe_fn)]

#[macro_use]
mod tracing_helpers;

mod adt;
pub mod config;
pub mod error;
pub mod key;
pub mod lockfree;
pub mod test;

pub use adt::ConcurrentSet;
pub use config::Config;
pub use error::{Error, InvariantViolation};
pub use key::{FloatKey, KeyExtractor, KeyFn, Natural};
pub use lockfree::SkipListSet;
