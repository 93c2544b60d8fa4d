//! Beat - the per-task facade
//!
//! Every task runs with a [`Beat`] bound to its own index and to the epoch in
//! which it was started. Everything a task does to move the sequence on goes
//! through it:
//!
//! - [`Beat::go`] / [`Beat::defer`] - advance now or after a delay
//! - [`Beat::once`] - advance on the first of several callbacks
//! - [`Beat::all`] - advance once every produced callback has been called
//! - [`Beat::next`] - run the following task without advancing
//!
//! Advancing operations are ignored once the sequencer has moved past the
//! epoch of the facade; `next` always looks at the live cursor.

use crate::error::StepResult;
use crate::join::{AllCallback, OnceCallback};
use crate::scheduler::TimerId;
use crate::sequencer::Sequencer;
use tracing::trace;

/// Capability object handed to each task invocation.
pub struct Beat<A> {
    seq: Sequencer<A>,
    index: usize,
    epoch: u64,
}

impl<A> Clone for Beat<A> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq.clone(),
            index: self.index,
            epoch: self.epoch,
        }
    }
}

impl<A> std::fmt::Debug for Beat<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beat")
            .field("index", &self.index)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<A: 'static> Beat<A> {
    pub(crate) fn new(seq: Sequencer<A>, index: usize, epoch: u64) -> Self {
        Self { seq, index, epoch }
    }

    /// Index of the task this facade belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Epoch this facade is bound to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the sequencer is still in this facade's epoch.
    pub fn is_current(&self) -> bool {
        self.seq.epoch() == self.epoch
    }

    /// The sequencer running this task (e.g. to enqueue more tasks).
    pub fn sequencer(&self) -> &Sequencer<A> {
        &self.seq
    }

    /// Advance to the task after this one and run it before returning.
    pub fn go(&self, args: A) -> StepResult {
        self.seq.advance_from(self.epoch, Some(self.index), args)
    }

    /// Advance after `delay_ms` logical milliseconds, forwarding `A::default()`.
    pub fn defer(&self, delay_ms: u64)
    where
        A: Default,
    {
        self.defer_with(delay_ms, A::default());
    }

    /// Advance after `delay_ms` logical milliseconds, forwarding `args`.
    pub fn defer_with(&self, delay_ms: u64, args: A) {
        if !self.is_current() {
            trace!(index = self.index, epoch = self.epoch, "defer from a finished step ignored");
            return;
        }
        self.seq
            .schedule_advance(self.epoch, Some(self.index), delay_ms, args);
    }

    /// Produce a callback that advances on its first call, racing every other
    /// once-callback of this step.
    pub fn once(&self) -> OnceCallback<A> {
        OnceCallback::new(self.seq.clone(), self.epoch, self.index)
    }

    /// Produce one slot of this step's barrier. The sequence advances when every
    /// slot produced for the step has been called.
    pub fn all(&self) -> AllCallback<A> {
        if self.is_current() {
            AllCallback::registered(self.seq.clone(), self.epoch, self.index)
        } else {
            AllCallback::detached(self.seq.clone(), self.epoch, self.index)
        }
    }

    /// Run the task after the cursor with `args` without advancing.
    ///
    /// Calling it again runs the same task again, unless that task advanced
    /// the sequencer in the meantime.
    pub fn next(&self, args: A) -> StepResult {
        self.seq.peek(args)
    }

    /// Run `f` after `delay_ms` on the clock that drives deferred advances.
    pub fn set_timeout<F>(&self, delay_ms: u64, f: F) -> TimerId
    where
        F: FnOnce() -> StepResult + 'static,
    {
        self.seq
            .scheduler()
            .borrow_mut()
            .schedule(delay_ms as f64, Box::new(f))
    }
}
