//! Error types for the sequencer and its engine.
//!
//! Tasks report failure by returning `Err(SequencerError)`. The sequencer never
//! catches these: they travel back out of whichever call ran the task.

use thiserror::Error;

/// Result of running a task or any operation that may run one.
pub type StepResult = Result<(), SequencerError>;

/// # Errors produced by tasks or by the engine driving them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequencerError {
    /// A task reported a failure.
    #[error("task failed: {message}")]
    Task {
        /// Message supplied by the task.
        message: String,
    },

    /// Offline stepping processed more timeslices than allowed in one call.
    #[error("advance_to({target_ms}ms) exceeded {limit} timeslices; likely runaway deferral")]
    TimesliceLimit {
        /// Configured `EngineConfig::max_timeslices`.
        limit: usize,
        /// Target time of the offending call.
        target_ms: f64,
    },

    /// An offline stepping call was made on a realtime engine.
    #[error("offline stepping requested on a realtime engine")]
    NotOffline,
}

impl SequencerError {
    /// Shorthand for [`SequencerError::Task`].
    pub fn task(message: impl Into<String>) -> Self {
        SequencerError::Task {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use beat_sequencer::SequencerError;
    ///
    /// assert_eq!(SequencerError::task("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SequencerError::Task { .. } => "task_failed",
            SequencerError::TimesliceLimit { .. } => "timeslice_limit",
            SequencerError::NotOffline => "not_offline",
        }
    }
}
