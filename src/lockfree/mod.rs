//! Lock-free data structures.

pub mod height;
mod markable;
mod skiplist;

pub use markable::MarkableLink;
pub use skiplist::SkipListSet;
