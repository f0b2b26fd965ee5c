// src/engine/mod.rs

//! Scheduling engine.
//!
//! - [`ready_set`] keeps runnable and waiting tasks ordered by the ranking
//!   rule.
//! - [`core`] is the synchronous step loop: it picks the best task, steps it
//!   and reacts to what the step reports. It performs no IO and can be
//!   driven one turn at a time in tests.
//! - [`pending`] tracks the external operations tasks are suspended on.
//! - [`runtime`] is the async shell around the core: it owns the loop task,
//!   waits on pending operations and new submissions, and exposes
//!   `start`/`stop`.
//!
//! Callers never touch the core directly. They talk to it through a
//! [`SchedulerHandle`], which only enqueues [`Command`]s for the loop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::errors::{Result, SchedError, TaskError};
use crate::task::instance::Task;
use crate::task::state::Outcome;
use crate::task::{TaskHandle, TaskInfo, WorkDescriptor};

/// Identity of a task. Monotonically increasing per scheduler; used for the
/// final tie-break between equally ranked tasks.
pub type TaskId = u64;

/// Predicate used by `remove_tasks` / `find_task`.
pub type TaskPredicate = Box<dyn Fn(&TaskInfo<'_>) -> bool + Send>;

type FoundTask = Option<(TaskId, watch::Receiver<Option<Outcome>>)>;

/// Requests flowing from handles into the scheduler loop.
pub(crate) enum Command {
    Queue(Task),
    Remove {
        predicate: TaskPredicate,
        reason: TaskError,
        reply: oneshot::Sender<bool>,
    },
    Find {
        predicate: TaskPredicate,
        reply: oneshot::Sender<FoundTask>,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Queue(task) => f.debug_tuple("Queue").field(task).finish(),
            Command::Remove { reason, .. } => {
                f.debug_struct("Remove").field("reason", reason).finish_non_exhaustive()
            }
            Command::Find { .. } => f.debug_struct("Find").finish_non_exhaustive(),
        }
    }
}

/// Cloneable submission API for one scheduler.
///
/// Every method only enqueues a command; the loop applies it between steps.
/// Requests made before `start()` are kept and applied once the loop runs.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
    ids: Arc<AtomicU64>,
}

impl SchedulerHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            ids: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    pub(crate) fn next_id(&self) -> TaskId {
        self.ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Schedule a task and return a handle to its result.
    ///
    /// The handle settles when the task is done. Fire-and-forget callers can
    /// drop it; the task still runs.
    pub fn queue_task<T>(&self, descriptor: WorkDescriptor<T>) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let task = Task::new(self.next_id(), descriptor.inner, None);
        let handle = TaskHandle::new(task.id(), task.subscribe());

        debug!(
            task = task.id(),
            name = %task.name(),
            priority = %task.priority(),
            interrupt = %task.interrupt(),
            "queueing task"
        );

        if self.tx.send(Command::Queue(task)).is_err() {
            warn!(task = handle.id(), "scheduler loop is gone; task dropped");
        }

        handle
    }

    /// Cancel every task matching `predicate`.
    ///
    /// Matching tasks that already started have their cleanup awaited, then
    /// their result futures reject with `reason` (or a default cancellation
    /// error). Resolves to `true` if anything was removed.
    pub fn remove_tasks<P>(
        &self,
        predicate: P,
        reason: Option<TaskError>,
    ) -> impl Future<Output = Result<bool>> + Send + use<P>
    where
        P: Fn(&TaskInfo<'_>) -> bool + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(Command::Remove {
                predicate: Box::new(predicate),
                reason: reason.unwrap_or_else(TaskError::cancelled),
                reply,
            })
            .is_ok();

        async move {
            if !sent {
                return Err(SchedError::LoopClosed);
            }
            rx.await.map_err(|_| SchedError::LoopClosed)
        }
    }

    /// Look up the result future of an in-flight task matching `predicate`
    /// (the oldest one if several match). Nothing is created or disturbed.
    pub fn find_task<T, P>(
        &self,
        predicate: P,
    ) -> impl Future<Output = Result<Option<TaskHandle<T>>>> + Send + use<T, P>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&TaskInfo<'_>) -> bool + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(Command::Find {
                predicate: Box::new(predicate),
                reply,
            })
            .is_ok();

        async move {
            if !sent {
                return Err(SchedError::LoopClosed);
            }
            let found = rx.await.map_err(|_| SchedError::LoopClosed)?;
            Ok(found.map(|(id, rx)| TaskHandle::new(id, rx)))
        }
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("issued_ids", &self.ids.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

pub mod core;
pub mod pending;
pub mod ready_set;
pub mod runtime;

pub use self::core::{CoreCommand, CoreStep, SchedulerCore};
pub use ready_set::{ReadySet, TaskRank};
pub use runtime::Scheduler;
