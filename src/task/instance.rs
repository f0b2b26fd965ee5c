// src/task/instance.rs

//! Runtime instance of one work descriptor.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::{AbortHandle, BoxFuture};
use futures::task::noop_waker_ref;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::engine::ready_set::TaskRank;
use crate::engine::{SchedulerHandle, TaskId};
use crate::errors::TaskError;
use crate::task::context::{Resume, SharedSlot, Slot, Suspension, TaskContext, lock_slot};
use crate::task::descriptor::{CleanupFuture, ErasedDescriptor};
use crate::task::handle::Settler;
use crate::task::state::{OperationValue, Outcome, SharedValue, StepOutcome, TaskState};
use crate::types::{InterruptPolicy, Priority};

/// Read-only view of a task, passed to `find_task` / `remove_tasks`
/// predicates.
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo<'a> {
    pub id: TaskId,
    pub name: Option<&'a str>,
    pub tag: Option<&'a str>,
    pub priority: Priority,
    pub interrupt: InterruptPolicy,
    pub state: TaskState,
    pub parent: Option<TaskId>,
}

/// An external operation the task is currently suspended on.
#[derive(Debug)]
pub(crate) struct WaitRegistration {
    pub(crate) token: u64,
    pub(crate) abort: AbortHandle,
}

pub(crate) struct Task {
    id: TaskId,
    created: Instant,
    descriptor: ErasedDescriptor,
    /// Set only for spawn-and-wait children; used to restore the parent.
    parent: Option<TaskId>,
    state: TaskState,
    body: Option<BoxFuture<'static, anyhow::Result<SharedValue>>>,
    slot: SharedSlot,
    settler: Settler,
    wait: Option<WaitRegistration>,
}

impl Task {
    pub(crate) fn new(id: TaskId, descriptor: ErasedDescriptor, parent: Option<TaskId>) -> Self {
        Self {
            id,
            created: Instant::now(),
            descriptor,
            parent,
            state: TaskState::NotStarted,
            body: None,
            slot: SharedSlot::default(),
            settler: Settler::new(),
            wait: None,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn priority(&self) -> Priority {
        self.descriptor.priority
    }

    pub(crate) fn interrupt(&self) -> InterruptPolicy {
        self.descriptor.interrupt
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub(crate) fn name(&self) -> &str {
        self.descriptor.name.as_deref().unwrap_or("<unnamed>")
    }

    pub(crate) fn info(&self) -> TaskInfo<'_> {
        TaskInfo {
            id: self.id,
            name: self.descriptor.name.as_deref(),
            tag: self.descriptor.tag.as_deref(),
            priority: self.descriptor.priority,
            interrupt: self.descriptor.interrupt,
            state: self.state,
            parent: self.parent,
        }
    }

    pub(crate) fn rank(&self) -> TaskRank {
        TaskRank {
            priority: self.descriptor.priority,
            waiting: self.state.is_waiting(),
            created: self.created,
            id: self.id,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.settler.subscribe()
    }

    /// Advance the body by one unit.
    ///
    /// Begins the body on the first call (and after a reset); otherwise
    /// resumes it from its last suspension point.
    pub(crate) fn step(&mut self, scheduler: &SchedulerHandle) -> Result<StepOutcome, TaskError> {
        match self.state {
            TaskState::NotStarted | TaskState::Active => {}
            TaskState::AwaitingSubtask => return Err(TaskError::SteppedWhileParked(self.id)),
            TaskState::AwaitingExternal => {
                return Err(TaskError::Internal(format!(
                    "task {} stepped before its pending operation settled",
                    self.id
                )));
            }
            TaskState::Done => {
                return Err(TaskError::Internal(format!(
                    "task {} stepped after it was done",
                    self.id
                )));
            }
        }

        if self.body.is_none() {
            trace!(task = self.id, name = %self.name(), "starting task body");
            let ctx = TaskContext::new(
                self.id,
                self.descriptor.priority,
                Arc::clone(&self.slot),
                scheduler.clone(),
            );
            let body = catch_unwind(AssertUnwindSafe(|| (self.descriptor.body)(ctx)))
                .map_err(panic_error)?;
            self.body = Some(body);
        }
        self.state = TaskState::Active;

        let Some(body) = self.body.as_mut() else {
            return Err(TaskError::Internal(format!("task {} has no body", self.id)));
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        let poll = catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx)))
            .map_err(panic_error)?;

        match poll {
            Poll::Ready(Ok(value)) => {
                self.body = None;
                Ok(StepOutcome::Finished(value))
            }
            Poll::Ready(Err(err)) => {
                self.body = None;
                Err(TaskError::from_body(err))
            }
            Poll::Pending => self.take_suspension(),
        }
    }

    fn take_suspension(&mut self) -> Result<StepOutcome, TaskError> {
        let request = lock_slot(&self.slot).request.take();

        match request {
            None | Some(Suspension::Yield) => Ok(StepOutcome::StillActive),
            Some(Suspension::External(op)) => {
                self.state = TaskState::AwaitingExternal;
                Ok(StepOutcome::Waiting(op))
            }
            Some(Suspension::Subtask(child)) => {
                let parent = self.descriptor.priority;
                if parent.is_more_urgent_than(child.priority) {
                    return Err(TaskError::PriorityInversion {
                        parent,
                        child: child.priority,
                    });
                }
                self.state = TaskState::AwaitingSubtask;
                Ok(StepOutcome::Spawned(child))
            }
        }
    }

    /// Abandon the in-progress computation and go back to `NotStarted`.
    ///
    /// Idempotent. Returns the cleanup routine to await if a suspended body
    /// was dropped.
    pub(crate) fn reset(&mut self) -> Option<CleanupFuture> {
        if matches!(self.state, TaskState::NotStarted | TaskState::Done) {
            return None;
        }

        if let Some(wait) = self.wait.take() {
            wait.abort.abort();
        }
        *lock_slot(&self.slot) = Slot::default();
        self.state = TaskState::NotStarted;

        if self.body.take().is_none() {
            return None;
        }

        debug!(task = self.id, name = %self.name(), "abandoned suspended task body");
        self.descriptor.cleanup.as_mut().map(|cleanup| cleanup())
    }

    pub(crate) fn mark_done(&mut self) {
        self.state = TaskState::Done;
        self.body = None;
        self.wait = None;
    }

    /// Settle the result future; a second call is ignored.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        self.settler.settle(outcome)
    }

    pub(crate) fn into_settler(self) -> Settler {
        self.settler
    }

    pub(crate) fn register_wait(&mut self, registration: WaitRegistration) {
        if let Some(stale) = self.wait.replace(registration) {
            stale.abort.abort();
        }
    }

    /// Feed an external result back in. Ignored unless it belongs to the wait
    /// this task is currently suspended on.
    pub(crate) fn resume_operation(
        &mut self,
        token: u64,
        result: Result<OperationValue, TaskError>,
    ) -> bool {
        let current = self.wait.as_ref().map(|wait| wait.token);
        if self.state != TaskState::AwaitingExternal || current != Some(token) {
            return false;
        }

        self.wait = None;
        lock_slot(&self.slot).resume = Some(Resume::Operation(result));
        self.state = TaskState::Active;
        true
    }

    /// Feed a finished sub-task's result back into this (parked) task.
    pub(crate) fn resume_subtask(&mut self, outcome: Outcome) -> bool {
        if self.state != TaskState::AwaitingSubtask {
            return false;
        }

        lock_slot(&self.slot).resume = Some(Resume::Subtask(outcome));
        self.state = TaskState::Active;
        true
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.descriptor.name)
            .field("priority", &self.descriptor.priority)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> TaskError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    TaskError::Panicked(message)
}
