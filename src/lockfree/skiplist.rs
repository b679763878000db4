//! Lock-free skip list set.
//!
//! Every level is a sorted linked list running from the head sentinel to the tail sentinel.
//! Level 0 holds every member; higher levels are an index over it. Deletion is logical first: a
//! node leaves the set the moment its level-0 link is marked, and is physically unlinked later by
//! whichever traversal passes over it.
//!
//! ```text
//! level 2:  HEAD ------------------> 30 ----------> TAIL
//! level 1:  HEAD --------> 10 -----> 30 ----------> TAIL
//! level 0:  HEAD --------> 10 -> 20 -> 30 -x-> 40 -> TAIL   (30 marked at level 0: not a member)
//! ```

use core::fmt;
use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering::*;
use std::collections::HashSet;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

use super::height;
use super::markable::MarkableLink;
use crate::adt::ConcurrentSet;
use crate::config::Config;
use crate::error::{Error, InvariantViolation};
use crate::key::{KeyExtractor, Natural, NodeKey};

/// Skip list node.
pub(crate) struct Node<T, K> {
    /// `None` only for the sentinels.
    value: Option<T>,
    key: NodeKey<K>,
    /// Top level of the tower. The node owns `height + 1` links.
    height: usize,
    /// Levels the node is currently linked at, plus one held by the inserter until it stops
    /// building the tower. Whoever drops it to zero retires the node.
    refs: AtomicUsize,
    next: Box<[MarkableLink<Node<T, K>>]>,
}

impl<T, K> Node<T, K> {
    fn new(value: Option<T>, key: NodeKey<K>, height: usize, refs: usize) -> Self {
        Self {
            value,
            key,
            height,
            refs: AtomicUsize::new(refs),
            next: (0..=height).map(|_| MarkableLink::null()).collect(),
        }
    }

    /// Drops one reference, retiring the node if it was the last.
    ///
    /// # Safety
    ///
    /// `node` must be published and the caller must own one of its references: either it is the
    /// inserter, or it has just unlinked `node` from one level.
    unsafe fn release(node: Shared<'_, Self>, guard: &Guard) {
        // SAFETY: the caller's reference keeps the node from being retired.
        if unsafe { node.deref() }.refs.fetch_sub(1, AcqRel) == 1 {
            // SAFETY: no level links to the node and nobody is building it any more, so no new
            // references can appear. Threads that still hold it are pinned.
            unsafe { guard.defer_destroy(node) };
        }
    }
}

/// Outcome of one attempt inside a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// The attempt took effect.
    Success,
    /// A link changed under the attempt; start over from the head.
    RetryFromStart,
    /// Only the splice at the current level failed; refresh that level and retry it.
    RetryThisLevel,
    /// The node was deleted while its tower was being built.
    Abandoned,
}

/// Predecessor and successor around a key at every level.
///
/// Pointers borrow the guard of the operation that produced them and must not outlive it.
struct Position<'g, T, K> {
    preds: Box<[Shared<'g, Node<T, K>>]>,
    succs: Box<[Shared<'g, Node<T, K>>]>,
}

impl<T, K> Position<'_, T, K> {
    fn new(max_height: usize) -> Self {
        Self {
            preds: vec![Shared::null(); max_height + 1].into_boxed_slice(),
            succs: vec![Shared::null(); max_height + 1].into_boxed_slice(),
        }
    }
}

/// Lock-free ordered set.
///
/// Values are ordered and identified by the key `E` derives from them. All operations take
/// `&self` and may be called from any number of threads. They are lock-free but not wait-free: a
/// thread that keeps losing compare-and-swap races retries without bound.
///
/// Removed values are dropped by the epoch collector once no pinned thread can observe them,
/// which may be after the set itself is dropped and on another thread. Values and keys are
/// therefore required to be `Send + 'static`:
///
/// ```compile_fail
/// use lockfree_skiplist::SkipListSet;
///
/// let local = 5;
/// let set = SkipListSet::new();
/// set.insert(&local).unwrap();
/// ```
///
/// ```compile_fail
/// use std::rc::Rc;
/// use lockfree_skiplist::SkipListSet;
///
/// let set = SkipListSet::new();
/// set.insert(Rc::new(5)).unwrap();
/// ```
pub struct SkipListSet<T, E = Natural>
where
    E: KeyExtractor<T>,
{
    head: Atomic<Node<T, E::Key>>,
    tail: Atomic<Node<T, E::Key>>,
    max_height: usize,
    extractor: E,
}

impl<T: Ord + Clone + Send + 'static> SkipListSet<T> {
    /// Creates an empty set ordered by `T`'s own `Ord` with the default configuration.
    pub fn new() -> Self {
        Self::with_extractor(Natural)
    }
}

impl<T, E> Default for SkipListSet<T, E>
where
    T: Send + 'static,
    E: KeyExtractor<T> + Default,
    E::Key: Send + 'static,
{
    fn default() -> Self {
        Self::with_extractor(E::default())
    }
}

impl<T, E> fmt::Debug for SkipListSet<T, E>
where
    E: KeyExtractor<T> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipListSet")
            .field("max_height", &self.max_height)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl<T, E> SkipListSet<T, E>
where
    T: Send + 'static,
    E: KeyExtractor<T>,
    E::Key: Send + 'static,
{
    /// Creates an empty set ordered by `extractor` with the default configuration.
    pub fn with_extractor(extractor: E) -> Self {
        Self::build(Config::default().max_height, extractor)
    }

    /// Creates an empty set with the given configuration.
    ///
    /// Fails with [`Error::InvalidMaxHeight`] if `config.max_height` is 0.
    pub fn with_config(config: Config, extractor: E) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::build(config.max_height, extractor))
    }

    fn build(max_height: usize, extractor: E) -> Self {
        // SAFETY: the set is not shared yet, so nothing can reclaim the sentinels.
        let guard = unsafe { epoch::unprotected() };
        let tail = Owned::new(Node::new(None, NodeKey::Max, max_height, 1)).into_shared(guard);
        let head = Node::new(None, NodeKey::Min, max_height, 1);
        for link in head.next.iter() {
            link.store_unmarked(tail);
        }
        Self {
            head: Atomic::from(Owned::new(head)),
            tail: Atomic::from(tail),
            max_height,
            extractor,
        }
    }

    /// Ceiling on node heights.
    pub fn max_height(&self) -> usize {
        self.max_height
    }

    fn key_of(&self, value: &T) -> Result<NodeKey<E::Key>, Error> {
        self.extractor
            .extract(value)
            .map(NodeKey::Key)
            .ok_or(Error::InvalidKey)
    }

    /// Finds the predecessor and successor of `key` at every level, unlinking marked nodes on
    /// the way. Returns whether level 0 holds an unmarked node with `key`.
    fn find<'g>(
        &'g self,
        key: &NodeKey<E::Key>,
        pos: &mut Position<'g, T, E::Key>,
        guard: &'g Guard,
    ) -> bool {
        loop {
            match self.find_pass(key, pos, guard) {
                Outcome::Success => break,
                _ => {
                    trace_log!("traversal restarted from head");
                }
            }
        }
        // SAFETY: a completed pass records a non-null successor at every level.
        unsafe { pos.succs[0].deref() }.key == *key
    }

    fn find_pass<'g>(
        &'g self,
        key: &NodeKey<E::Key>,
        pos: &mut Position<'g, T, E::Key>,
        guard: &'g Guard,
    ) -> Outcome {
        let mut pred = self.head.load(Relaxed, guard);
        for level in (0..=self.max_height).rev() {
            // SAFETY for every `deref` below: `pred` and `curr` are reached from the head under
            // `guard`, so they are not reclaimed before it is dropped. Links of nodes in a level
            // are never null before the tail, and the walk never moves past the tail.
            let mut curr = unsafe { pred.deref() }.next[level].reference(guard);
            loop {
                let (mut succ, mut marked) = unsafe { curr.deref() }.next[level].read(guard);
                while marked {
                    if !unsafe { pred.deref() }.next[level]
                        .compare_and_swap(curr, succ, false, false, guard)
                    {
                        return Outcome::RetryFromStart;
                    }
                    // SAFETY: the CAS above removed `curr` from this level.
                    unsafe { Node::release(curr, guard) };
                    curr = unsafe { pred.deref() }.next[level].reference(guard);
                    (succ, marked) = unsafe { curr.deref() }.next[level].read(guard);
                }

                if unsafe { curr.deref() }.key < *key {
                    pred = curr;
                    curr = succ;
                } else {
                    break;
                }
            }
            pos.preds[level] = pred;
            pos.succs[level] = curr;
        }
        Outcome::Success
    }

    /// Walks down to the first level-0 node whose key is not less than `key`. Marked nodes are
    /// stepped over, never unlinked.
    fn seek<'g>(&'g self, key: &NodeKey<E::Key>, guard: &'g Guard) -> &'g Node<T, E::Key> {
        let mut pred = self.head.load(Relaxed, guard);
        let mut level = self.max_height;
        loop {
            // SAFETY: as in `find_pass`.
            let mut curr = unsafe { pred.deref() }.next[level].reference(guard);
            let node = loop {
                let node = unsafe { curr.deref() };
                let (succ, marked) = node.next[level].read(guard);
                if marked {
                    curr = succ;
                } else if node.key < *key {
                    pred = curr;
                    curr = succ;
                } else {
                    break node;
                }
            };
            if level == 0 {
                return node;
            }
            level -= 1;
        }
    }

    /// Adds `value`. Returns `Ok(false)` if a value with the same key is already present.
    pub fn insert(&self, value: T) -> Result<bool, Error> {
        let key = self.key_of(&value)?;
        let height = height::thread_height(self.max_height);
        let guard = &epoch::pin();
        let mut pos = Position::new(self.max_height);

        // One reference for the level-0 link, one for this thread while it builds the tower.
        let mut node = Owned::new(Node::new(Some(value), key, height, 2));
        let node = loop {
            if self.find(&node.key, &mut pos, guard) {
                return Ok(false);
            }
            for (link, succ) in node.next.iter().zip(pos.succs.iter()) {
                link.store_unmarked(*succ);
            }
            // SAFETY: a completed traversal records non-null predecessors.
            match unsafe { pos.preds[0].deref() }.next[0].publish(pos.succs[0], node, guard) {
                Ok(node) => break node,
                Err(n) => {
                    node = n;
                    trace_log!("bottom-level splice lost a race");
                }
            }
        };

        // The value is a member from here on; upper levels only speed up searches.
        // SAFETY: this thread holds a reference to the node.
        let node_ref = unsafe { node.deref() };
        'tower: for level in 1..=height {
            let backoff = Backoff::new();
            loop {
                match self.link_level(node, level, &pos, guard) {
                    Outcome::Success => break,
                    Outcome::RetryThisLevel => {
                        backoff.spin();
                        let _ = self.find(&node_ref.key, &mut pos, guard);
                    }
                    Outcome::Abandoned => {
                        trace_log!(level = level, "tower abandoned after concurrent delete");
                        break 'tower;
                    }
                    Outcome::RetryFromStart => unreachable!("splicing one level never restarts"),
                }
            }
        }
        debug_log!(height = height, "inserted");

        // SAFETY: gives back the inserter's reference.
        unsafe { Node::release(node, guard) };
        Ok(true)
    }

    /// Makes one attempt at splicing `node` into `level` at the recorded position.
    fn link_level<'g>(
        &'g self,
        node: Shared<'g, Node<T, E::Key>>,
        level: usize,
        pos: &Position<'g, T, E::Key>,
        guard: &'g Guard,
    ) -> Outcome {
        // SAFETY: the inserter holds a reference to `node`.
        let node_ref = unsafe { node.deref() };
        let link = &node_ref.next[level];
        let succ = pos.succs[level];

        let (own_succ, marked) = link.read(guard);
        if marked {
            return Outcome::Abandoned;
        }
        // Until the node is linked at this level only a deleter can change this link, by marking it.
        if own_succ != succ && !link.compare_and_swap(own_succ, succ, false, false, guard) {
            return Outcome::Abandoned;
        }

        node_ref.refs.fetch_add(1, Relaxed);
        // SAFETY: a completed traversal records non-null predecessors.
        let pred = unsafe { pos.preds[level].deref() };
        if !pred.next[level].compare_and_swap(succ, node, false, false, guard) {
            node_ref.refs.fetch_sub(1, Relaxed);
            return Outcome::RetryThisLevel;
        }

        if link.is_marked(guard) {
            // Marked between our check and the splice, possibly after the deleter's cleanup pass.
            let _ = self.find(&node_ref.key, &mut Position::new(self.max_height), guard);
            return Outcome::Abandoned;
        }
        Outcome::Success
    }

    /// Removes the value with the same key as `value`. Returns `Ok(true)` iff this call removed
    /// it.
    pub fn delete(&self, value: &T) -> Result<bool, Error> {
        let key = self.key_of(value)?;
        let guard = &epoch::pin();
        let mut pos = Position::new(self.max_height);

        if !self.find(&key, &mut pos, guard) {
            return Ok(false);
        }
        // SAFETY: `find` returned a node, which stays allocated while we are pinned.
        let victim = unsafe { pos.succs[0].deref() };

        for link in victim.next[1..].iter().rev() {
            let (mut succ, mut marked) = link.read(guard);
            while !marked {
                let _ = link.try_mark(succ, true, guard);
                (succ, marked) = link.read(guard);
            }
        }

        let bottom = &victim.next[0];
        loop {
            let (succ, marked) = bottom.read(guard);
            if marked {
                return Ok(false);
            }
            if bottom.try_mark(succ, true, guard) {
                debug_log!(height = victim.height, "deleted");
                let _ = self.find(&key, &mut pos, guard);
                return Ok(true);
            }
        }
    }

    /// Returns whether a value with the same key as `value` is in the set.
    pub fn contains(&self, value: &T) -> Result<bool, Error> {
        let key = self.key_of(value)?;
        let guard = &epoch::pin();
        let node = self.seek(&key, guard);
        Ok(node.key == key && !node.next[0].is_marked(guard))
    }

    /// Returns the stored value with the same key as `value`.
    ///
    /// The reference lives as long as `guard`; the value may be deleted concurrently but is not
    /// dropped before the guard is.
    pub fn get<'g>(&'g self, value: &T, guard: &'g Guard) -> Result<Option<&'g T>, Error> {
        let key = self.key_of(value)?;
        let node = self.seek(&key, guard);
        if node.key == key && !node.next[0].is_marked(guard) {
            Ok(node.value.as_ref())
        } else {
            Ok(None)
        }
    }

    /// Returns whether the set has no members.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        // SAFETY: as in `find_pass`.
        let mut curr = unsafe { self.head.load(Relaxed, guard).deref() }.next[0].reference(guard);
        loop {
            let node = unsafe { curr.deref() };
            if matches!(node.key, NodeKey::Max) {
                return true;
            }
            let (succ, marked) = node.next[0].read(guard);
            if !marked {
                return false;
            }
            curr = succ;
        }
    }

    /// Checks the structure level by level.
    ///
    /// Verifies that keys strictly increase from the head to the tail, that no node is linked
    /// above its height, and that every unmarked node of an upper level is also at level 0. Only
    /// meaningful while no other thread is mutating the set.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let guard = &epoch::pin();
        let head = self.head.load(Relaxed, guard);
        let tail = self.tail.load(Relaxed, guard);
        let mut base = HashSet::new();

        for level in 0..=self.max_height {
            // SAFETY: the sentinels live as long as the set.
            let mut prev = unsafe { head.deref() };
            let mut curr = prev.next[level].reference(guard);
            while curr != tail {
                // SAFETY: reached from the head under `guard`.
                let Some(node) = (unsafe { curr.as_ref() }) else {
                    return Err(InvariantViolation::MissingTail { level });
                };
                if node.key <= prev.key {
                    return Err(InvariantViolation::UnorderedLevel { level });
                }
                if node.height < level {
                    return Err(InvariantViolation::HeightExceeded { level });
                }
                if level == 0 {
                    let _ = base.insert(curr.as_raw());
                } else if !node.next[0].is_marked(guard) && !base.contains(&curr.as_raw()) {
                    return Err(InvariantViolation::NotInBaseLevel { level });
                }
                prev = node;
                curr = node.next[level].reference(guard);
            }
        }
        Ok(())
    }
}

impl<T, E> ConcurrentSet<T> for SkipListSet<T, E>
where
    T: Send + 'static,
    E: KeyExtractor<T>,
    E::Key: Send + 'static,
{
    fn contains(&self, value: &T) -> Result<bool, Error> {
        SkipListSet::contains(self, value)
    }

    fn insert(&self, value: T) -> Result<bool, Error> {
        SkipListSet::insert(self, value)
    }

    fn delete(&self, value: &T) -> Result<bool, Error> {
        SkipListSet::delete(self, value)
    }
}

impl<T, E> Drop for SkipListSet<T, E>
where
    E: KeyExtractor<T>,
{
    fn drop(&mut self) {
        // SAFETY: with `&mut self` no operation is in flight, so every inserter has released its
        // reference and each node's count equals the number of levels still linking it. Walking
        // the levels top-down frees a node at the last level that links it.
        unsafe {
            let guard = epoch::unprotected();
            let head = self.head.load(Relaxed, guard);
            let tail = self.tail.load(Relaxed, guard);
            for level in (0..=self.max_height).rev() {
                let mut curr = head.deref().next[level].reference(guard);
                while curr != tail {
                    let node = curr.deref();
                    let next = node.next[level].reference(guard);
                    if node.refs.fetch_sub(1, Relaxed) == 1 {
                        drop(curr.into_owned());
                    }
                    curr = next;
                }
            }
            drop(head.into_owned());
            drop(tail.into_owned());
        }
    }
}
