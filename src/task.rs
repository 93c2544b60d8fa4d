//! Task abstraction
//!
//! A task is anything that can be run with a [`Beat`] facade and the arguments
//! forwarded by the previous step. Closures `Fn(&Beat<A>, A) -> StepResult`
//! implement [`Task`] automatically.

use crate::beat::Beat;
use crate::error::StepResult;
use std::rc::Rc;

/// A single step of a sequence.
pub trait Task<A>: 'static {
    /// Run the step. Use `beat` to decide when the sequence moves on.
    fn run(&self, beat: &Beat<A>, args: A) -> StepResult;
}

impl<A, F> Task<A> for F
where
    F: Fn(&Beat<A>, A) -> StepResult + 'static,
{
    fn run(&self, beat: &Beat<A>, args: A) -> StepResult {
        self(beat, args)
    }
}

/// Shared handle to a task.
pub type TaskRef<A> = Rc<dyn Task<A>>;

/// Wrap a task in a [`TaskRef`].
pub fn task_ref<A: 'static, T: Task<A>>(task: T) -> TaskRef<A> {
    Rc::new(task)
}
