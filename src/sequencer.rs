//! Sequencer
//!
//! The runner itself: an append-only list of tasks, a cursor pointing at the
//! active one, and an epoch that invalidates callbacks and timers left behind by
//! earlier steps.
//!
//! The state lives behind `Rc<RefCell<>>` and the borrow is always released
//! before a task runs, so tasks may freely re-enter the sequencer (enqueue more
//! tasks, advance, defer, peek).

use crate::beat::Beat;
use crate::error::StepResult;
use crate::join::PendingJoin;
use crate::scheduler::TimeScheduler;
use crate::task::{Task, TaskRef};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Index of the task that follows `cursor` (`0` before the first advance).
pub(crate) fn following(cursor: Option<usize>) -> usize {
    cursor.map_or(0, |c| c + 1)
}

/// Inner state of a sequencer (behind Rc<RefCell<>>).
pub(crate) struct SequencerInner<A> {
    tasks: Vec<TaskRef<A>>,

    /// Active task; `None` until the first advance.
    cursor: Option<usize>,

    /// Bumped on every advance.
    epoch: u64,

    /// `all()` barriers of the current epoch.
    joins: Vec<PendingJoin>,

    /// A deferred advance for the current epoch is waiting on its timer.
    deferred_armed: bool,

    /// Clock used by `defer`.
    scheduler: Rc<RefCell<TimeScheduler>>,
}

/// Handle to a sequencer. Cloning yields another handle to the same runner.
pub struct Sequencer<A = ()>(Rc<RefCell<SequencerInner<A>>>);

impl<A> Clone for Sequencer<A> {
    fn clone(&self) -> Self {
        Sequencer(self.0.clone())
    }
}

impl<A> fmt::Debug for Sequencer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Sequencer")
            .field("tasks", &inner.tasks.len())
            .field("cursor", &inner.cursor)
            .field("epoch", &inner.epoch)
            .field("joins", &inner.joins)
            .field("deferred_armed", &inner.deferred_armed)
            .finish()
    }
}

impl<A: 'static> Sequencer<A> {
    /// Create an empty sequencer whose deferred advances run on `scheduler`.
    pub fn new(scheduler: Rc<RefCell<TimeScheduler>>) -> Self {
        Sequencer(Rc::new(RefCell::new(SequencerInner {
            tasks: Vec::new(),
            cursor: None,
            epoch: 0,
            joins: Vec::new(),
            deferred_armed: false,
            scheduler,
        })))
    }

    /// Append a task. Returns `self` for chaining.
    pub fn beat<F>(&self, task: F) -> &Self
    where
        F: Fn(&Beat<A>, A) -> StepResult + 'static,
    {
        self.0.borrow_mut().tasks.push(Rc::new(task));
        self
    }

    /// Alias of [`Sequencer::beat`].
    pub fn step<F>(&self, task: F) -> &Self
    where
        F: Fn(&Beat<A>, A) -> StepResult + 'static,
    {
        self.beat(task)
    }

    /// Append a task implemented as a type rather than a closure.
    pub fn beat_task<T: Task<A>>(&self, task: T) -> &Self {
        self.0.borrow_mut().tasks.push(Rc::new(task));
        self
    }

    /// Append several shared tasks in iteration order.
    pub fn beats<I>(&self, tasks: I) -> &Self
    where
        I: IntoIterator<Item = TaskRef<A>>,
    {
        self.0.borrow_mut().tasks.extend(tasks);
        self
    }

    /// Advance to the next task and run it before returning.
    ///
    /// Past the end of the list nothing runs; outstanding callbacks are still
    /// invalidated.
    pub fn go(&self, args: A) -> StepResult {
        let target = following(self.cursor());
        self.advance_to(target, args)
    }

    /// Advance after `delay_ms` logical milliseconds, forwarding `A::default()`.
    pub fn defer(&self, delay_ms: u64)
    where
        A: Default,
    {
        self.defer_with(delay_ms, A::default());
    }

    /// Advance after `delay_ms` logical milliseconds, forwarding `args`.
    ///
    /// The timer is tied to the current epoch; if anything advances the
    /// sequencer first, the timer fires as a no-op.
    pub fn defer_with(&self, delay_ms: u64, args: A) {
        let (epoch, cursor) = {
            let inner = self.0.borrow();
            (inner.epoch, inner.cursor)
        };
        self.schedule_advance(epoch, cursor, delay_ms, args);
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.0.borrow().tasks.len()
    }

    /// Whether no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().tasks.is_empty()
    }

    /// Index of the active task, `None` before the first advance.
    pub fn cursor(&self) -> Option<usize> {
        self.0.borrow().cursor
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.0.borrow().epoch
    }

    /// Whether a deferred advance for the current step is still waiting.
    pub fn is_deferred(&self) -> bool {
        self.0.borrow().deferred_armed
    }

    /// Snapshot of the `all()` barriers that have not been satisfied yet.
    pub fn pending_joins(&self) -> Vec<PendingJoin> {
        self.0.borrow().joins.clone()
    }

    /// The scheduler deferred advances run on.
    pub fn scheduler(&self) -> Rc<RefCell<TimeScheduler>> {
        self.0.borrow().scheduler.clone()
    }

    /// Whether two handles refer to the same sequencer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Advance on behalf of the step at `from` that was active during `epoch`.
    /// Ignored once that epoch has passed.
    pub(crate) fn advance_from(&self, epoch: u64, from: Option<usize>, args: A) -> StepResult {
        let current = self.epoch();
        if current != epoch {
            trace!(epoch, current, "stale advance ignored");
            return Ok(());
        }
        self.advance_to(following(from), args)
    }

    /// Schedule `advance_from(epoch, from, args)` on the scheduler.
    pub(crate) fn schedule_advance(
        &self,
        epoch: u64,
        from: Option<usize>,
        delay_ms: u64,
        args: A,
    ) {
        let scheduler = {
            let mut inner = self.0.borrow_mut();
            inner.deferred_armed = true;
            inner.scheduler.clone()
        };
        let seq = self.clone();
        let timer = scheduler.borrow_mut().schedule(
            delay_ms as f64,
            Box::new(move || seq.advance_from(epoch, from, args)),
        );
        debug!(timer = timer.0, epoch, delay_ms, "advance deferred");
    }

    /// Register one more producer on the `all()` barrier of `(epoch, index)`.
    pub(crate) fn join_produced(&self, epoch: u64, index: usize) {
        let mut inner = self.0.borrow_mut();
        match inner
            .joins
            .iter_mut()
            .find(|j| j.epoch == epoch && j.index == index)
        {
            Some(join) => {
                join.produced += 1;
                join.remaining += 1;
            }
            None => inner.joins.push(PendingJoin {
                epoch,
                index,
                produced: 1,
                remaining: 1,
            }),
        }
    }

    /// Count one completion on the barrier of `(epoch, index)`; the last one
    /// advances with its own arguments.
    pub(crate) fn join_completed(&self, epoch: u64, index: usize, args: A) -> StepResult {
        let satisfied = {
            let mut inner = self.0.borrow_mut();
            if inner.epoch != epoch {
                trace!(epoch, current = inner.epoch, "stale all-callback ignored");
                return Ok(());
            }
            let Some(pos) = inner
                .joins
                .iter()
                .position(|j| j.epoch == epoch && j.index == index)
            else {
                return Ok(());
            };
            let join = &mut inner.joins[pos];
            join.remaining = join.remaining.saturating_sub(1);
            trace!(epoch, index, remaining = join.remaining, "all-callback counted");
            if join.remaining == 0 {
                inner.joins.remove(pos);
                true
            } else {
                false
            }
        };

        if satisfied {
            self.advance_from(epoch, Some(index), args)
        } else {
            Ok(())
        }
    }

    /// Run the task after the cursor without moving it.
    pub(crate) fn peek(&self, args: A) -> StepResult {
        let (task, beat) = {
            let inner = self.0.borrow();
            let index = following(inner.cursor);
            let Some(task) = inner.tasks.get(index).cloned() else {
                trace!(index, "nothing to peek");
                return Ok(());
            };
            (task, Beat::new(self.clone(), index, inner.epoch))
        };
        trace!(index = beat.index(), epoch = beat.epoch(), "peeking");
        task.run(&beat, args)
    }

    /// Move to `target` and run the task there.
    fn advance_to(&self, target: usize, args: A) -> StepResult {
        let (task, beat) = {
            let mut inner = self.0.borrow_mut();
            inner.epoch += 1;
            inner.joins.clear();
            inner.deferred_armed = false;

            let Some(task) = inner.tasks.get(target).cloned() else {
                trace!(target, epoch = inner.epoch, "advanced past the last task");
                return Ok(());
            };
            debug!(from = ?inner.cursor, to = target, epoch = inner.epoch, "advance");
            inner.cursor = Some(target);
            (task, Beat::new(self.clone(), target, inner.epoch))
        };
        task.run(&beat, args)
    }
}
