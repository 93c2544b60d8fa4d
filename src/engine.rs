//! Engine - realtime and offline timer loops
//!
//! The engine is the event loop behind `defer` and `set_timeout`: it pops
//! due timers from the scheduler and fires them, one timer per turn.
//! - Realtime: sleeps with spin_sleep until the next deadline
//! - Offline: jumps the logical clock forward through the stepping API

use crate::error::{SequencerError, StepResult};
use crate::scheduler::{TimeScheduler, TimerId};
use crate::sequencer::Sequencer;
use spin_sleep::SpinSleeper;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

pub use crate::scheduler::SchedulerMode;

/// Configuration for the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Logical milliseconds per wall millisecond (realtime only).
    pub rate: f64,
    /// Upper bound on timers fired by a single offline stepping call.
    pub max_timeslices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            max_timeslices: 200_000,
        }
    }
}

/// The timer engine.
pub struct Engine {
    pub scheduler: Rc<RefCell<TimeScheduler>>,
    sleeper: SpinSleeper,
    config: EngineConfig,
}

impl Engine {
    /// Create a new engine with the given mode and configuration.
    pub fn new(mode: SchedulerMode, config: EngineConfig) -> Self {
        let scheduler = Rc::new(RefCell::new(TimeScheduler::new(mode)));
        if mode == SchedulerMode::Realtime {
            scheduler.borrow_mut().set_rate(config.rate);
        }

        Self {
            scheduler,
            sleeper: SpinSleeper::default(),
            config,
        }
    }

    /// Offline engine with the default configuration.
    pub fn offline() -> Self {
        Self::new(SchedulerMode::Offline, EngineConfig::default())
    }

    /// Realtime engine with the default configuration.
    pub fn realtime() -> Self {
        Self::new(SchedulerMode::Realtime, EngineConfig::default())
    }

    pub fn mode(&self) -> SchedulerMode {
        self.scheduler.borrow().mode
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the scheduler.
    pub fn scheduler(&self) -> Rc<RefCell<TimeScheduler>> {
        self.scheduler.clone()
    }

    /// An empty sequencer whose deferred advances run on this engine.
    pub fn sequencer<A: 'static>(&self) -> Sequencer<A> {
        Sequencer::new(self.scheduler.clone())
    }

    /// Get the current logical time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.scheduler.borrow().now_ms()
    }

    /// Run `f` after `delay_ms` logical milliseconds.
    pub fn set_timeout<F>(&self, delay_ms: u64, f: F) -> TimerId
    where
        F: FnOnce() -> StepResult + 'static,
    {
        self.scheduler
            .borrow_mut()
            .schedule(delay_ms as f64, Box::new(f))
    }

    /// Number of timers still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.borrow().pending_timers()
    }

    /// Fire the earliest timer if it is due now. Returns whether one fired.
    ///
    /// This is one turn of the event loop: a timer scheduled while another is
    /// firing waits for a later turn even if its delay is zero.
    pub fn turn(&mut self) -> Result<bool, SequencerError> {
        let due = {
            let mut sched = self.scheduler.borrow_mut();
            let now = sched.now_ms();
            match sched.peek_next_deadline() {
                Some(deadline) if deadline <= now => sched.take_next(),
                _ => None,
            }
        };
        let Some((id, deadline, fire)) = due else {
            return Ok(false);
        };
        debug!(timer = id.0, deadline, "timer fired");
        fire()?;
        Ok(true)
    }

    /// Fire timers until none remain.
    ///
    /// Offline this jumps the clock from deadline to deadline; realtime it
    /// sleeps until each deadline.
    pub fn run_until_idle(&mut self) -> StepResult {
        self.run_until(|| false)
    }

    /// Fire timers until `is_done` holds or no timers remain.
    pub fn run_until<F>(&mut self, is_done: F) -> StepResult
    where
        F: Fn() -> bool,
    {
        let mut processed = 0;
        loop {
            if is_done() {
                break;
            }

            let next = self.scheduler.borrow().peek_next_deadline();
            let Some(next_t) = next else {
                break;
            };

            match self.mode() {
                SchedulerMode::Offline => {
                    {
                        let mut sched = self.scheduler.borrow_mut();
                        sched.offline_now = sched.offline_now.max(next_t);
                    }
                    processed += 1;
                    if processed > self.config.max_timeslices {
                        return Err(SequencerError::TimesliceLimit {
                            limit: self.config.max_timeslices,
                            target_ms: next_t,
                        });
                    }
                    self.turn()?;
                }
                SchedulerMode::Realtime => {
                    let (now, rate) = {
                        let sched = self.scheduler.borrow();
                        (sched.now_ms(), sched.rate())
                    };
                    if next_t <= now {
                        self.turn()?;
                        continue;
                    }
                    let dt_wall_ms = ((next_t - now) / rate).max(0.0);
                    self.sleeper.sleep(Duration::from_secs_f64(dt_wall_ms / 1000.0));
                }
            }
        }
        Ok(())
    }

    /// Advance offline time to `target_ms`, firing every timer due on the way.
    pub fn advance_to(&mut self, target_ms: f64) -> StepResult {
        if self.mode() != SchedulerMode::Offline {
            return Err(SequencerError::NotOffline);
        }

        let mut processed = 0;
        loop {
            let next = self.scheduler.borrow().peek_next_deadline();
            let Some(next_t) = next.filter(|t| *t <= target_ms) else {
                break;
            };

            {
                let mut sched = self.scheduler.borrow_mut();
                sched.offline_now = sched.offline_now.max(next_t);
            }
            self.turn()?;

            processed += 1;
            if processed > self.config.max_timeslices {
                return Err(SequencerError::TimesliceLimit {
                    limit: self.config.max_timeslices,
                    target_ms,
                });
            }
        }

        let mut sched = self.scheduler.borrow_mut();
        sched.offline_now = sched.offline_now.max(target_ms);
        Ok(())
    }

    /// Step offline time by `dt_ms` milliseconds.
    pub fn step_ms(&mut self, dt_ms: f64) -> StepResult {
        let dt = if dt_ms.is_finite() && dt_ms > 0.0 {
            dt_ms
        } else {
            0.0
        };
        let target = self.now_ms() + dt;
        self.advance_to(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_offline_timers_fire_in_order() {
        let mut engine = Engine::offline();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(30, "c"), (10, "a"), (20, "b")] {
            let o = order.clone();
            engine.set_timeout(delay, move || {
                o.borrow_mut().push(label);
                Ok(())
            });
        }

        engine.step_ms(15.0).unwrap();
        assert_eq!(*order.borrow(), vec!["a"]);
        assert_eq!(engine.now_ms(), 15.0);

        engine.run_until_idle().unwrap();
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert_eq!(engine.now_ms(), 30.0);
    }

    #[test]
    fn test_turn_fires_one_timer() {
        let mut engine = Engine::offline();
        let hits = Rc::new(Cell::new(0));

        for _ in 0..2 {
            let h = hits.clone();
            engine.set_timeout(0, move || {
                h.set(h.get() + 1);
                Ok(())
            });
        }

        assert!(engine.turn().unwrap());
        assert_eq!(hits.get(), 1);
        assert!(engine.turn().unwrap());
        assert!(!engine.turn().unwrap());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_turn_ignores_future_timers() {
        let mut engine = Engine::offline();
        engine.set_timeout(5, || Ok(()));
        assert!(!engine.turn().unwrap());
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn test_timer_error_propagates_and_keeps_the_rest() {
        let mut engine = Engine::offline();
        engine.set_timeout(1, || Err(SequencerError::task("boom")));
        engine.set_timeout(2, || Ok(()));

        let err = engine.run_until_idle().unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn test_runaway_rescheduling_is_reported() {
        fn again(sched: Rc<RefCell<TimeScheduler>>) {
            let next = sched.clone();
            sched
                .borrow_mut()
                .schedule(0.0, Box::new(move || {
                    again(next);
                    Ok(())
                }));
        }

        let mut engine = Engine::new(
            SchedulerMode::Offline,
            EngineConfig {
                max_timeslices: 50,
                ..Default::default()
            },
        );
        again(engine.scheduler());

        let err = engine.advance_to(10.0).unwrap_err();
        assert_eq!(
            err,
            SequencerError::TimesliceLimit {
                limit: 50,
                target_ms: 10.0
            }
        );
    }

    #[test]
    fn test_config_is_kept() {
        let engine = Engine::new(
            SchedulerMode::Realtime,
            EngineConfig {
                rate: 2.5,
                max_timeslices: 7,
            },
        );
        assert_eq!(engine.mode(), SchedulerMode::Realtime);
        assert_eq!(engine.config().rate, 2.5);
        assert_eq!(engine.config().max_timeslices, 7);
        assert_eq!(engine.scheduler().borrow().rate(), 2.5);

        let defaults = Engine::offline();
        assert_eq!(defaults.config().rate, 1.0);
        assert_eq!(defaults.config().max_timeslices, 200_000);
    }

    #[test]
    fn test_stepping_requires_offline() {
        let mut engine = Engine::realtime();
        assert_eq!(engine.step_ms(1.0), Err(SequencerError::NotOffline));
    }

    #[test]
    fn test_realtime_run_until_idle() {
        let mut engine = Engine::new(
            SchedulerMode::Realtime,
            EngineConfig {
                rate: 10.0,
                ..Default::default()
            },
        );
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        engine.set_timeout(20, move || {
            f.set(true);
            Ok(())
        });

        engine.run_until_idle().unwrap();
        assert!(fired.get());
        assert!(engine.now_ms() >= 20.0);
    }
}
