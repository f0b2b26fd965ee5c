// src/task/state.rs

//! Task lifecycle states and the result of a single step.

use std::any::Any;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::errors::TaskError;
use crate::task::descriptor::ErasedDescriptor;

/// Type-erased successful task result, shared by every handle of the task.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

/// Final result of a task as published to its handles.
pub(crate) type Outcome = Result<SharedValue, TaskError>;

/// Value produced by an external pending operation.
pub(crate) type OperationValue = Box<dyn Any + Send>;

/// An external pending operation the scheduler waits on for a task.
pub(crate) type PendingOp = BoxFuture<'static, Result<OperationValue, TaskError>>;

/// Lifecycle state of a task.
///
/// `NotStarted -> Active <-> AwaitingExternal / AwaitingSubtask -> Done`.
/// A reset (restart or cancellation) sends a task back to `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not stepped yet, or reset.
    NotStarted,
    /// Runnable now.
    Active,
    /// Suspended on an operation outside the scheduler's control.
    AwaitingExternal,
    /// Parked until a spawned sub-task is done. Not in the ready set.
    AwaitingSubtask,
    /// Terminal; the result future has settled.
    Done,
}

impl TaskState {
    /// Waiting tasks rank behind ready tasks of the same priority.
    pub fn is_waiting(self) -> bool {
        matches!(self, TaskState::AwaitingExternal | TaskState::AwaitingSubtask)
    }
}

/// What a single `Task::step` reported.
pub(crate) enum StepOutcome {
    /// The body returned a value.
    Finished(SharedValue),
    /// The body yielded without waiting on anything.
    StillActive,
    /// The body is suspended on this external operation.
    Waiting(PendingOp),
    /// The body is suspended on a sub-task built from this descriptor.
    Spawned(ErasedDescriptor),
}

impl std::fmt::Debug for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Finished(_) => f.write_str("Finished"),
            StepOutcome::StillActive => f.write_str("StillActive"),
            StepOutcome::Waiting(_) => f.write_str("Waiting"),
            StepOutcome::Spawned(desc) => f.debug_tuple("Spawned").field(desc).finish(),
        }
    }
}
