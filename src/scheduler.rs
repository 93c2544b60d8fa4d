//! Time Scheduler
//!
//! Owns the logical clock and the queue of pending timers.
//! Hands out timers one at a time in deadline order; the engine fires them.

use crate::error::StepResult;
use crate::pq::TimerQueue;
use std::time::Instant;
use tracing::trace;

/// Scheduler execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerMode {
    Realtime,
    Offline,
}

/// Callback run when a timer comes due.
pub type TimerFn = Box<dyn FnOnce() -> StepResult>;

/// Identifier of a scheduled timer (its scheduling sequence number).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// The main time scheduler. Times are logical milliseconds.
pub struct TimeScheduler {
    pub mode: SchedulerMode,

    /// Deterministic sequence counter.
    seq: u64,

    /// Time dilation anchors (realtime only).
    rate: f64,
    wall_anchor: Instant,
    logical_anchor: f64,

    /// Offline clock.
    pub offline_now: f64,

    timers: TimerQueue<TimerFn>,
}

impl TimeScheduler {
    /// Create a new scheduler.
    pub fn new(mode: SchedulerMode) -> Self {
        Self {
            mode,
            seq: 0,
            rate: 1.0,
            wall_anchor: Instant::now(),
            logical_anchor: 0.0,
            offline_now: 0.0,
            timers: TimerQueue::new(),
        }
    }

    /// Allocate a deterministic sequence number.
    pub fn alloc_seq(&mut self) -> u64 {
        let s = self.seq;
        self.seq += 1;
        s
    }

    /// Get the current logical time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        match self.mode {
            SchedulerMode::Offline => self.offline_now,
            SchedulerMode::Realtime => {
                let dt = Instant::now().duration_since(self.wall_anchor).as_secs_f64();
                self.logical_anchor + dt * 1000.0 * self.rate
            }
        }
    }

    /// Set the time dilation rate (realtime only).
    pub fn set_rate(&mut self, rate: f64) {
        if self.mode == SchedulerMode::Offline {
            return;
        }
        let r = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        };
        let l = self.now_ms();
        self.logical_anchor = l;
        self.wall_anchor = Instant::now();
        self.rate = r;
    }

    /// Get the current rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Schedule `fire` to run `delay_ms` logical milliseconds from now.
    /// Negative or non-finite delays are treated as zero.
    pub fn schedule(&mut self, delay_ms: f64, fire: TimerFn) -> TimerId {
        let delay = if delay_ms.is_finite() && delay_ms > 0.0 {
            delay_ms
        } else {
            0.0
        };
        let deadline = self.now_ms() + delay;
        let seq = self.alloc_seq();
        self.timers.add(deadline, seq, fire);
        trace!(timer = seq, deadline, "timer scheduled");
        TimerId(seq)
    }

    /// Deadline of the earliest pending timer.
    pub fn peek_next_deadline(&self) -> Option<f64> {
        self.timers.peek_deadline()
    }

    /// Remove the earliest timer (ties in scheduling order).
    /// The caller fires it after releasing its borrow of the scheduler.
    pub fn take_next(&mut self) -> Option<(TimerId, f64, TimerFn)> {
        self.timers
            .pop()
            .map(|(deadline, seq, fire)| (TimerId(seq), deadline, fire))
    }

    /// Check if there are any pending timers.
    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
