//! Completion joins
//!
//! Callbacks handed out by [`Beat::once`](crate::Beat::once) and
//! [`Beat::all`](crate::Beat::all). Both capture the epoch of the step that
//! produced them and do nothing once the sequencer has moved past it.
//!
//! - A once-callback races: the first effective call advances, every other
//!   once-callback of that step becomes stale with it.
//! - An all-callback is one slot of a barrier: each distinct callback counts
//!   once, and the call that brings the barrier to zero advances, forwarding
//!   its own arguments. Arguments of the earlier calls are not collected.

use crate::error::StepResult;
use crate::sequencer::Sequencer;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// State of an `all()` barrier that has not been satisfied yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingJoin {
    /// Epoch of the step that produced the callbacks.
    pub epoch: u64,
    /// Index of the step that produced the callbacks.
    pub index: usize,
    /// Callbacks produced so far.
    pub produced: usize,
    /// Callbacks still to be called.
    pub remaining: usize,
}

/// Callback produced by `once()`. Cloning yields the same callback.
pub struct OnceCallback<A> {
    seq: Sequencer<A>,
    epoch: u64,
    index: usize,
}

impl<A> Clone for OnceCallback<A> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq.clone(),
            epoch: self.epoch,
            index: self.index,
        }
    }
}

impl<A> fmt::Debug for OnceCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceCallback")
            .field("epoch", &self.epoch)
            .field("index", &self.index)
            .finish()
    }
}

impl<A: 'static> OnceCallback<A> {
    pub(crate) fn new(seq: Sequencer<A>, epoch: u64, index: usize) -> Self {
        Self { seq, epoch, index }
    }

    /// Advance with `args` unless this step has already been left.
    pub fn call(&self, args: A) -> StepResult {
        self.seq.advance_from(self.epoch, Some(self.index), args)
    }

    /// Whether calling this callback can still have any effect.
    pub fn is_stale(&self) -> bool {
        self.seq.epoch() != self.epoch
    }
}

/// Callback produced by `all()`. Cloning yields the same barrier slot, so a
/// clone and its original together count once.
pub struct AllCallback<A> {
    seq: Sequencer<A>,
    epoch: u64,
    index: usize,
    counted: Rc<Cell<bool>>,
}

impl<A> Clone for AllCallback<A> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq.clone(),
            epoch: self.epoch,
            index: self.index,
            counted: self.counted.clone(),
        }
    }
}

impl<A> fmt::Debug for AllCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllCallback")
            .field("epoch", &self.epoch)
            .field("index", &self.index)
            .field("counted", &self.counted.get())
            .finish()
    }
}

impl<A: 'static> AllCallback<A> {
    /// A slot registered on the barrier of `(epoch, index)`.
    pub(crate) fn registered(seq: Sequencer<A>, epoch: u64, index: usize) -> Self {
        seq.join_produced(epoch, index);
        Self {
            seq,
            epoch,
            index,
            counted: Rc::new(Cell::new(false)),
        }
    }

    /// A slot produced after its step was left; never counts.
    pub(crate) fn detached(seq: Sequencer<A>, epoch: u64, index: usize) -> Self {
        Self {
            seq,
            epoch,
            index,
            counted: Rc::new(Cell::new(true)),
        }
    }

    /// Mark this slot complete. The last slot of the barrier advances with `args`.
    pub fn call(&self, args: A) -> StepResult {
        if self.counted.replace(true) {
            trace!(epoch = self.epoch, index = self.index, "all-callback already counted");
            return Ok(());
        }
        self.seq.join_completed(self.epoch, self.index, args)
    }

    /// Whether calling this callback can still have any effect.
    pub fn is_stale(&self) -> bool {
        self.counted.get() || self.seq.epoch() != self.epoch
    }
}
