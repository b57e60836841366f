//! # Recency Heap
//!
//! Priority queue ordered by a process-wide logical clock, used by both cache
//! tiers to pick least-recently-touched eviction victims.
//!
//! ## Overview
//!
//! Every push draws a fresh value from a strictly increasing counter, so ties
//! are impossible and ordering never depends on wall-clock time. The queue is an
//! array-backed binary min-heap plus an index from payload to heap slot:
//!
//! - `push` / `pop` are O(log n)
//! - `remove` marks the slot as a tombstone in O(1); the tombstone is purged
//!   when `pop` reaches it, or when compaction runs
//! - `move_to_top` is `remove` followed by `push`
//!
//! "Top" is the end that pops last, so touching an entry makes it survive
//! longest.
//!
//! ```rust
//! use core_cache::RecencyHeap;
//!
//! let mut heap: RecencyHeap<&str> = ["a", "b", "c"].into_iter().collect();
//! heap.move_to_top(&"a").unwrap();
//! assert_eq!(heap.pop().unwrap(), "b");
//! assert_eq!(heap.pop().unwrap(), "c");
//! assert_eq!(heap.pop().unwrap(), "a");
//! ```

use crate::error::{CacheError, Result};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide logical clock shared by every heap.
static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Arrays smaller than this are never compacted.
const COMPACT_MIN_LEN: usize = 64;

fn next_sequence() -> u64 {
    CLOCK.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Present,
    Removed,
}

#[derive(Debug, Clone)]
struct HeapEntry<K> {
    payload: K,
    state: EntryState,
    sequence: u64,
}

/// Lazy-deletion recency queue.
///
/// At most one present entry exists per payload. Removed entries may linger in
/// the backing array as tombstones but are never returned.
#[derive(Debug, Clone)]
pub struct RecencyHeap<K> {
    entries: Vec<HeapEntry<K>>,
    slots: HashMap<K, usize>,
}

impl<K> Default for RecencyHeap<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<K> RecencyHeap<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of present entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no present entries remain.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of removed entries still occupying the backing array.
    pub fn tombstones(&self) -> usize {
        self.entries.len() - self.slots.len()
    }

    /// Returns `true` if `item` is tracked.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.contains_key(item)
    }

    /// Insert `item` with a fresh sequence number.
    ///
    /// Fails with [`CacheError::DuplicateKey`] if the item is already tracked.
    pub fn push(&mut self, item: K) -> Result<()> {
        if self.slots.contains_key(&item) {
            return Err(CacheError::DuplicateKey(format!("{:?}", item)));
        }

        let slot = self.entries.len();
        self.entries.push(HeapEntry {
            payload: item.clone(),
            state: EntryState::Present,
            sequence: next_sequence(),
        });
        self.slots.insert(item, slot);
        self.sift_up(slot);
        Ok(())
    }

    /// Remove and return the least-recently-touched item.
    ///
    /// Tombstones encountered on the way are discarded. Fails with
    /// [`CacheError::Empty`] if nothing is present.
    pub fn pop(&mut self) -> Result<K> {
        while let Some(entry) = self.take_root() {
            if entry.state == EntryState::Present {
                self.slots.remove(&entry.payload);
                return Ok(entry.payload);
            }
        }
        Err(CacheError::Empty)
    }

    /// The least-recently-touched item, without removing it.
    pub fn peek(&mut self) -> Option<&K> {
        while self
            .entries
            .first()
            .is_some_and(|entry| entry.state == EntryState::Removed)
        {
            self.take_root();
        }
        self.entries.first().map(|entry| &entry.payload)
    }

    /// Stop tracking `item`.
    ///
    /// Fails with [`CacheError::NotFound`] and leaves the heap untouched if the
    /// item is not tracked.
    pub fn remove<Q>(&mut self, item: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let slot = self
            .slots
            .remove(item)
            .ok_or_else(|| CacheError::NotFound(format!("{:?}", item)))?;
        self.bury(slot);
        self.maybe_compact();
        Ok(())
    }

    /// Re-insert `item` with a fresh sequence number so it pops last.
    ///
    /// Same failure mode as [`remove`](Self::remove).
    pub fn move_to_top<Q>(&mut self, item: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let (payload, slot) = self
            .slots
            .remove_entry(item)
            .ok_or_else(|| CacheError::NotFound(format!("{:?}", item)))?;
        self.bury(slot);
        self.maybe_compact();
        self.push(payload)
    }

    /// Present items, oldest first.
    ///
    /// Intended for inspection; consumers should rely on `pop` for ordering.
    pub fn entries(&self) -> Vec<K> {
        let mut present: Vec<&HeapEntry<K>> = self
            .entries
            .iter()
            .filter(|entry| entry.state == EntryState::Present)
            .collect();
        present.sort_by_key(|entry| entry.sequence);
        present.into_iter().map(|entry| entry.payload.clone()).collect()
    }

    /// Drop every entry, present or removed.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    /// Purge all tombstones and restore the heap property.
    pub fn compact(&mut self) {
        self.entries
            .retain(|entry| entry.state == EntryState::Present);
        for pos in 0..self.entries.len() {
            self.reindex(pos);
        }
        for pos in (0..self.entries.len() / 2).rev() {
            self.sift_down(pos);
        }
    }

    fn bury(&mut self, slot: usize) {
        if let Some(entry) = self.entries.get_mut(slot) {
            entry.state = EntryState::Removed;
        }
    }

    fn maybe_compact(&mut self) {
        if self.entries.len() >= COMPACT_MIN_LEN && self.tombstones() > self.slots.len() {
            self.compact();
        }
    }

    fn take_root(&mut self) -> Option<HeapEntry<K>> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let root = self.entries.pop();
        if !self.entries.is_empty() {
            self.reindex(0);
            self.sift_down(0);
        }
        root
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.entries[pos].sequence >= self.entries[parent].sequence {
                break;
            }
            self.entries.swap(pos, parent);
            self.reindex(pos);
            self.reindex(parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.entries[left].sequence < self.entries[smallest].sequence {
                smallest = left;
            }
            if right < len && self.entries[right].sequence < self.entries[smallest].sequence {
                smallest = right;
            }
            if smallest == pos {
                break;
            }

            self.entries.swap(pos, smallest);
            self.reindex(pos);
            self.reindex(smallest);
            pos = smallest;
        }
    }

    /// Point the index at `pos` for the entry now stored there.
    fn reindex(&mut self, pos: usize) {
        let entry = &self.entries[pos];
        if entry.state == EntryState::Present {
            if let Some(slot) = self.slots.get_mut(&entry.payload) {
                *slot = pos;
            }
        }
    }
}

impl<K> FromIterator<K> for RecencyHeap<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut heap = Self::new();
        heap.extend(iter);
        heap
    }
}

impl<K> Extend<K> for RecencyHeap<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Push each item in order; an already tracked item is moved to top.
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for item in iter {
            if self.contains(&item) {
                // Present, so move_to_top cannot fail.
                let _ = self.move_to_top(&item);
            } else {
                let _ = self.push(item);
            }
        }
    }
}
