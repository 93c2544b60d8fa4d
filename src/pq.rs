//! Timer priority queue
//!
//! A min-heap over `(deadline, seq)` built on `std::collections::BinaryHeap`.
//! Entries with equal deadlines come out in the order they were added, so
//! timers scheduled for the same instant fire deterministically.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry. Ordering only looks at the key, never at the payload.
struct Entry<M> {
    deadline: f64,
    seq: u64,
    meta: M,
}

impl<M> PartialEq for Entry<M> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.to_bits() == other.deadline.to_bits() && self.seq == other.seq
    }
}

impl<M> Eq for Entry<M> {}

impl<M> PartialOrd for Entry<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap, so the ordering is reversed for min-heap behavior.
// total_cmp keeps float ordering deterministic.
impl<M> Ord for Entry<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .total_cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// A min-priority queue of timers keyed by deadline, ties broken by sequence.
pub struct TimerQueue<M> {
    heap: BinaryHeap<Entry<M>>,
}

impl<M> Default for TimerQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TimerQueue<M> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Add an item due at `deadline`. `seq` must be unique per queue.
    pub fn add(&mut self, deadline: f64, seq: u64, meta: M) {
        self.heap.push(Entry {
            deadline,
            seq,
            meta,
        });
    }

    /// Earliest deadline, if any.
    pub fn peek_deadline(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pop the earliest item. Returns (deadline, seq, metadata).
    pub fn pop(&mut self) -> Option<(f64, u64, M)> {
        self.heap.pop().map(|e| (e.deadline, e.seq, e.meta))
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
