//! An indexed binary min-heap over pool members, ordered by load.
//!
//! The index owns its members in a slab addressed by a stable id (the order in
//! which they were inserted) and keeps a separate array-backed heap of those
//! ids. Every member caches its own heap slot through [`Loaded::set_position`],
//! which is what lets an arbitrary member be repositioned in `O(log n)` after
//! its load changes instead of the `O(n)` search a plain binary heap would
//! need.
//!
//! Nothing here blocks or locks. The index is meant to have exactly one owner
//! that serializes every mutation; in this crate that owner is the
//! [`Balancer`] coordinator.
//!
//! [`Balancer`]: crate::Balancer

#[cfg(test)]
mod tests;

use crate::{Error, Result};

/// A member that can be ranked by a [`LoadIndex`].
///
/// The index is the only code that calls the setters. Implementors store the
/// values and return them unchanged.
pub trait Loaded {
    /// Number of outstanding assignments.
    fn load(&self) -> usize;

    /// Overwrites the number of outstanding assignments.
    fn set_load(&mut self, load: usize);

    /// Current slot in the heap array, or `None` while unseated.
    fn position(&self) -> Option<usize>;

    /// Records the member's slot in the heap array.
    fn set_position(&mut self, position: Option<usize>);
}

/// Min-heap by [`Loaded::load`] with `O(log n)` arbitrary-member update.
///
/// Invariants held on return from every method:
/// - for every non-root slot `i`, `load(heap[(i - 1) / 2]) <= load(heap[i])`;
/// - every seated member appears in the heap exactly once, and its cached
///   position is its slot.
///
/// Members with equal load are not ordered with respect to each other. Which
/// of several least-loaded members [`peek_min`](Self::peek_min) returns is
/// unspecified.
#[derive(Debug, Clone)]
pub struct LoadIndex<L> {
    members: Vec<L>,
    heap: Vec<usize>,
}

impl<L> Default for LoadIndex<L> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            heap: Vec::new(),
        }
    }
}

impl<L: Loaded> LoadIndex<L> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index with room for `capacity` members.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
            heap: Vec::with_capacity(capacity),
        }
    }

    /// Adds a new member and seats it. Returns the member's id.
    pub fn insert(&mut self, mut member: L) -> usize {
        let id = self.members.len();
        member.set_position(None);
        self.members.push(member);
        self.seat(id);
        id
    }

    /// Re-seats a member previously taken out with [`pop_min`] or
    /// [`remove`].
    ///
    /// Pushing a member that is already seated leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWorker`] if `id` was never inserted.
    ///
    /// [`pop_min`]: Self::pop_min
    /// [`remove`]: Self::remove
    pub fn push(&mut self, id: usize) -> Result<()> {
        let member = self
            .members
            .get(id)
            .ok_or(Error::UnknownWorker { worker: id })?;

        if member.position().is_none() {
            self.seat(id);
        }

        Ok(())
    }

    /// Unseats and returns the id of a least-loaded member.
    ///
    /// # Panics
    ///
    /// Panics if no member is seated. A pool is never drained, so an empty
    /// index means that invariant has already been broken.
    pub fn pop_min(&mut self) -> usize {
        self.try_pop_min()
            .expect("pop_min called on an empty load index")
    }

    /// Unseats and returns the id of a least-loaded member, or `None` if no
    /// member is seated.
    pub fn try_pop_min(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            None
        } else {
            Some(self.unseat(0))
        }
    }

    /// Returns the id of a least-loaded member without unseating it.
    pub fn peek_min(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    /// Unseats an arbitrary member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWorker`] if `id` is unknown or not seated.
    pub fn remove(&mut self, id: usize) -> Result<()> {
        let slot = self.slot_of(id)?;
        self.unseat(slot);
        Ok(())
    }

    /// Applies `delta` to a seated member's load and restores heap order.
    ///
    /// A negative delta can only move the member towards the root, a positive
    /// one only towards the leaves, so a single sift in one direction is
    /// enough. Returns the member's new load.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownWorker`] if `id` is unknown or not seated.
    /// - [`Error::LoadUnderflow`] if the load would drop below zero (or
    ///   overflow).
    ///
    /// The index is left untouched on error.
    pub fn update_and_reseat(&mut self, id: usize, delta: isize) -> Result<usize> {
        let slot = self.slot_of(id)?;
        let member = &mut self.members[id];
        let load = member
            .load()
            .checked_add_signed(delta)
            .ok_or(Error::LoadUnderflow { worker: id })?;
        member.set_load(load);

        if delta < 0 {
            self.sift_up(slot);
        } else if delta > 0 {
            self.sift_down(slot);
        }

        debug_assert!(self.is_heap());
        Ok(load)
    }

    /// Returns the member with the given id, seated or not.
    pub fn get(&self, id: usize) -> Option<&L> {
        self.members.get(id)
    }

    /// Iterates all members in id order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &L> + '_ {
        self.members.iter()
    }

    /// Iterates the ids of seated members in heap-array order.
    pub fn heap_order(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.heap.iter().copied()
    }

    /// Number of members, seated or not.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no member was ever inserted.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of seated members.
    pub fn seated(&self) -> usize {
        self.heap.len()
    }

    /// Sum of every member's load.
    pub fn total_load(&self) -> usize {
        self.members.iter().map(Loaded::load).sum()
    }

    /// Checks heap order and position bookkeeping.
    ///
    /// Intended for tests and debug assertions; runs in `O(n)`.
    pub fn is_heap(&self) -> bool {
        let ordered = (1..self.heap.len()).all(|slot| {
            let parent = (slot - 1) / 2;
            self.load_at(parent) <= self.load_at(slot)
        });

        let tracked = self
            .heap
            .iter()
            .enumerate()
            .all(|(slot, &id)| self.members[id].position() == Some(slot));

        let seated = self
            .members
            .iter()
            .filter(|member| member.position().is_some())
            .count();

        ordered && tracked && seated == self.heap.len()
    }

    fn slot_of(&self, id: usize) -> Result<usize> {
        self.members
            .get(id)
            .and_then(Loaded::position)
            .ok_or(Error::UnknownWorker { worker: id })
    }

    fn load_at(&self, slot: usize) -> usize {
        self.members[self.heap[slot]].load()
    }

    fn seat(&mut self, id: usize) {
        let slot = self.heap.len();
        self.heap.push(id);
        self.members[id].set_position(Some(slot));
        self.sift_up(slot);
    }

    fn unseat(&mut self, slot: usize) -> usize {
        let id = self.heap.swap_remove(slot);
        self.members[id].set_position(None);

        if slot < self.heap.len() {
            self.members[self.heap[slot]].set_position(Some(slot));
            if !self.sift_up(slot) {
                self.sift_down(slot);
            }
        }

        id
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.members[self.heap[a]].set_position(Some(a));
        self.members[self.heap[b]].set_position(Some(b));
    }

    /// Returns `true` if the member moved.
    fn sift_up(&mut self, mut slot: usize) -> bool {
        let start = slot;
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.load_at(slot) >= self.load_at(parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot != start
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let child = if right < len && self.load_at(right) < self.load_at(left) {
                right
            } else {
                left
            };

            if self.load_at(child) >= self.load_at(slot) {
                break;
            }
            self.swap(slot, child);
            slot = child;
        }
    }
}
