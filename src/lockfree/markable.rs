//! Atomic (reference, deletion mark) pair.
//!
//! The mark lives in the lowest tag bit of a `crossbeam_epoch::Atomic`, so the reference and the
//! mark are always read and written by the same atomic instruction.

use core::sync::atomic::Ordering::*;

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};

const MARK: usize = 1;

#[inline]
fn tag(marked: bool) -> usize {
    if marked {
        MARK
    } else {
        0
    }
}

/// A link to the next node that can be logically marked as deleted.
///
/// Failure of any compare-and-set here is the normal outcome of losing a race, never an error.
#[derive(Debug)]
pub struct MarkableLink<N> {
    inner: Atomic<N>,
}

impl<N> Default for MarkableLink<N> {
    fn default() -> Self {
        Self::null()
    }
}

impl<N> MarkableLink<N> {
    /// Creates an unmarked null link.
    pub fn null() -> Self {
        Self {
            inner: Atomic::null(),
        }
    }

    /// Creates an unmarked link to `target`.
    pub fn new(target: Shared<'_, N>) -> Self {
        Self {
            inner: Atomic::from(target.with_tag(0)),
        }
    }

    /// Reads the reference and the mark together.
    ///
    /// The returned reference has its tag cleared, so it can be compared against and stored into
    /// other links directly.
    #[inline]
    pub fn read<'g>(&self, guard: &'g Guard) -> (Shared<'g, N>, bool) {
        let raw = self.inner.load(Acquire, guard);
        (raw.with_tag(0), raw.tag() & MARK != 0)
    }

    /// Reads only the reference.
    #[inline]
    pub fn reference<'g>(&self, guard: &'g Guard) -> Shared<'g, N> {
        self.read(guard).0
    }

    /// Reads only the mark.
    #[inline]
    pub fn is_marked(&self, guard: &Guard) -> bool {
        self.read(guard).1
    }

    /// Sets the mark to `new_marked` while keeping the reference.
    ///
    /// Succeeds iff the link currently points to `expected` and its mark differs from
    /// `new_marked`. Has no effect on failure.
    #[inline]
    pub fn try_mark(&self, expected: Shared<'_, N>, new_marked: bool, guard: &Guard) -> bool {
        self.compare_and_swap(expected, expected, !new_marked, new_marked, guard)
    }

    /// Replaces the reference and the mark together.
    ///
    /// Succeeds iff both the current reference equals `expected` and the current mark equals
    /// `expected_marked`.
    #[inline]
    pub fn compare_and_swap(
        &self,
        expected: Shared<'_, N>,
        new: Shared<'_, N>,
        expected_marked: bool,
        new_marked: bool,
        guard: &Guard,
    ) -> bool {
        self.inner
            .compare_exchange(
                expected.with_tag(tag(expected_marked)),
                new.with_tag(tag(new_marked)),
                AcqRel,
                Acquire,
                guard,
            )
            .is_ok()
    }

    /// Swings an unmarked link from `expected` to a node that has not been shared yet.
    ///
    /// On success the node becomes reachable through this link and its shared pointer is
    /// returned. On failure ownership is handed back so the caller can retry with it.
    #[inline]
    pub fn publish<'g>(
        &self,
        expected: Shared<'_, N>,
        node: Owned<N>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, N>, Owned<N>> {
        self.inner
            .compare_exchange(expected.with_tag(0), node, AcqRel, Acquire, guard)
            .map_err(|e| e.new)
    }

    /// Points the link at `target`, unmarked, without synchronization.
    ///
    /// Only meant for links of nodes that no other thread can reach yet.
    #[inline]
    pub(crate) fn store_unmarked(&self, target: Shared<'_, N>) {
        self.inner.store(target.with_tag(0), Relaxed);
    }
}
