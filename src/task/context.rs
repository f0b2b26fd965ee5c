// src/task/context.rs

//! The suspension API handed to every task body.
//!
//! A body never waits on anything itself. At each suspension point it leaves
//! a request in the task's [`Slot`] and returns `Pending` once; the scheduler
//! picks the request up, does the waiting, and puts the result back into the
//! slot before polling the body again.

use std::any::type_name;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::FutureExt;

use crate::engine::{SchedulerHandle, TaskId};
use crate::errors::TaskError;
use crate::task::descriptor::{ErasedDescriptor, WorkDescriptor};
use crate::task::state::{OperationValue, Outcome, PendingOp};
use crate::types::Priority;

/// What a body asked for at its latest suspension point.
pub(crate) enum Suspension {
    Yield,
    External(PendingOp),
    Subtask(ErasedDescriptor),
}

/// What the scheduler hands back when the body resumes.
pub(crate) enum Resume {
    Operation(Result<OperationValue, TaskError>),
    Subtask(Outcome),
}

/// Mailbox shared between a task and its running body.
#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) request: Option<Suspension>,
    pub(crate) resume: Option<Resume>,
}

pub(crate) type SharedSlot = Arc<Mutex<Slot>>;

/// Lock a slot, recovering from poisoning (a panicking body is already
/// reported through its own result).
pub(crate) fn lock_slot(slot: &SharedSlot) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle a task body uses to suspend itself.
#[derive(Clone)]
pub struct TaskContext {
    id: TaskId,
    priority: Priority,
    slot: SharedSlot,
    scheduler: SchedulerHandle,
}

impl TaskContext {
    pub(crate) fn new(
        id: TaskId,
        priority: Priority,
        slot: SharedSlot,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            id,
            priority,
            slot,
            scheduler,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Submission API of the scheduler running this task.
    ///
    /// Use it for fire-and-forget `queue_task`. `remove_tasks` and
    /// `find_task` return futures that must go through [`wait_for`].
    ///
    /// [`wait_for`]: TaskContext::wait_for
    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Bare cooperative yield: lets the scheduler re-evaluate priorities.
    pub async fn yield_now(&self) {
        self.request(Suspension::Yield);
        Suspend::default().await;
    }

    /// Suspend until `op` settles. The scheduler polls `op` on this task's
    /// behalf; other tasks keep running meanwhile.
    pub async fn wait_for<V, E, F>(&self, op: F) -> Result<V, TaskError>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
        V: Send + 'static,
        E: Into<anyhow::Error>,
    {
        let op: PendingOp = async move {
            match op.await {
                Ok(value) => Ok(Box::new(value) as OperationValue),
                Err(err) => Err(TaskError::Operation(Arc::new(err.into()))),
            }
        }
        .boxed();

        self.request(Suspension::External(op));
        Suspend::default().await;

        match self.take_resume() {
            Some(Resume::Operation(Ok(value))) => {
                value
                    .downcast::<V>()
                    .map(|value| *value)
                    .map_err(|_| TaskError::TypeMismatch {
                        expected: type_name::<V>(),
                    })
            }
            Some(Resume::Operation(Err(err))) => Err(err),
            Some(Resume::Subtask(_)) | None => Err(self.missing_resume("pending operation")),
        }
    }

    /// Spawn a sub-task and suspend until it is done.
    ///
    /// The sub-task must be at least as urgent as this task; otherwise this
    /// task's step fails with [`TaskError::PriorityInversion`] and the
    /// sub-task is never created.
    pub async fn spawn_and_wait<V>(&self, descriptor: WorkDescriptor<V>) -> Result<V, TaskError>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.request(Suspension::Subtask(descriptor.inner));
        Suspend::default().await;

        match self.take_resume() {
            Some(Resume::Subtask(Ok(value))) => {
                value
                    .downcast_ref::<V>()
                    .cloned()
                    .ok_or(TaskError::TypeMismatch {
                        expected: type_name::<V>(),
                    })
            }
            Some(Resume::Subtask(Err(err))) => Err(err),
            Some(Resume::Operation(_)) | None => Err(self.missing_resume("sub-task")),
        }
    }

    fn request(&self, suspension: Suspension) {
        lock_slot(&self.slot).request = Some(suspension);
    }

    fn take_resume(&self) -> Option<Resume> {
        lock_slot(&self.slot).resume.take()
    }

    fn missing_resume(&self, what: &str) -> TaskError {
        TaskError::Internal(format!(
            "task {} resumed without a result for its {what}",
            self.id
        ))
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Returns `Pending` exactly once, handing control back to the scheduler.
///
/// No waker is registered: the scheduler decides when to poll again.
#[derive(Default)]
struct Suspend {
    suspended: bool,
}

impl Future for Suspend {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.suspended {
            Poll::Ready(())
        } else {
            self.suspended = true;
            Poll::Pending
        }
    }
}
