//! Beat Sequencer
//!
//! A minimal sequential task runner. Tasks are queued in order and run one at
//! a time; each task decides when the sequence moves on:
//! - Immediately (`go`), within the same call stack
//! - After a timer (`defer`), fired by the [`Engine`]
//! - After the first of several callbacks (`once`) or after all of them (`all`)
//!
//! Callbacks and timers left behind by a step are invalidated as soon as the
//! sequencer advances, so late or duplicate completions are harmless.
//!
//! ```
//! use beat_sequencer::{sequence, Engine, Sequencer};
//!
//! let mut engine = Engine::offline();
//! let seq: Sequencer<u32> = sequence![engine.scheduler();
//!     |beat, n: u32| beat.go(n + 1),
//!     |beat, n| { beat.defer_with(250, n * 10); Ok(()) },
//!     |_, n| { assert_eq!(n, 20); Ok(()) },
//! ];
//!
//! seq.go(1).unwrap();
//! assert_eq!(seq.cursor(), Some(1));
//!
//! engine.step_ms(250.0).unwrap();
//! assert_eq!(seq.cursor(), Some(2));
//! ```

pub mod beat;
pub mod engine;
pub mod error;
pub mod join;
pub mod pq;
pub mod scheduler;
pub mod sequencer;
pub mod task;


pub use beat::Beat;
pub use engine::{Engine, EngineConfig, SchedulerMode};
pub use error::{SequencerError, StepResult};
pub use join::{AllCallback, OnceCallback, PendingJoin};
pub use scheduler::{TimeScheduler, TimerId};
pub use sequencer::Sequencer;
pub use task::{task_ref, Task, TaskRef};

/// Build a [`Sequencer`] on a scheduler from a list of tasks, in order.
///
/// ```
/// use beat_sequencer::{sequence, Engine, Sequencer};
///
/// let engine = Engine::offline();
/// let seq: Sequencer = sequence![engine.scheduler(); |b, _| b.go(()), |_, _| Ok(())];
/// assert_eq!(seq.len(), 2);
///
/// let empty: Sequencer = sequence![engine.scheduler()];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! sequence {
    ($scheduler:expr $(; $($task:expr),* $(,)?)?) => {{
        let seq = $crate::Sequencer::new($scheduler);
        $($(
            seq.beat($task);
        )*)?
        seq
    }};
}
