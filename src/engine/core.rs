// src/engine/core.rs

//! Pure scheduler core.
//!
//! [`SchedulerCore`] owns every tracked task, the ready set and the
//! "current task" slot. Each call to [`SchedulerCore::turn`] picks the task
//! that should run, steps it once and reacts to what the step reported. The
//! result is a [`CoreStep`]: commands for the async shell (wait on an
//! operation, await a cleanup) plus whether there is anything left to do
//! before some external event arrives.
//!
//! Nothing in here awaits, spawns or touches a channel, so tests can drive
//! the core turn by turn and inspect it in between.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::engine::pending::{PendingWait, SettledOperation};
use crate::engine::ready_set::ReadySet;
use crate::engine::{SchedulerHandle, TaskId};
use crate::errors::TaskError;
use crate::task::descriptor::CleanupFuture;
use crate::task::handle::Settler;
use crate::task::instance::{Task, TaskInfo, WaitRegistration};
use crate::task::state::{Outcome, StepOutcome, TaskState};
use crate::task::{TaskHandle, WorkDescriptor};
use crate::types::InterruptPolicy;

/// A result that must be published once the preceding cleanup finished.
pub struct Settlement {
    task: TaskId,
    settler: Settler,
    outcome: Outcome,
}

impl Settlement {
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Publish the result to every handle of the task.
    pub fn apply(self) {
        if !self.settler.settle(self.outcome) {
            warn!(task = self.task, "task result was already settled");
        }
    }
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("task", &self.task)
            .field("ok", &self.outcome.is_ok())
            .finish()
    }
}

/// Work the core hands to the async shell.
pub enum CoreCommand {
    /// Poll this operation and feed its result back through
    /// [`SchedulerCore::settle_operation`].
    AwaitOperation(PendingWait),
    /// Await an abandoned task's cleanup routine, then publish `then`.
    Cleanup {
        task: TaskId,
        cleanup: CleanupFuture,
        then: Option<Settlement>,
    },
}

impl fmt::Debug for CoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreCommand::AwaitOperation(wait) => f.debug_tuple("AwaitOperation").field(wait).finish(),
            CoreCommand::Cleanup { task, then, .. } => f
                .debug_struct("Cleanup")
                .field("task", task)
                .field("then", then)
                .finish_non_exhaustive(),
        }
    }
}

/// Decision returned by one [`SchedulerCore::turn`].
#[derive(Debug)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// `true` when no task can make progress until a new submission, a
    /// settled operation or a stop request arrives.
    pub idle: bool,
}

impl CoreStep {
    fn busy(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            idle: false,
        }
    }

    fn idle(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            idle: true,
        }
    }
}

/// Synchronous scheduler state.
pub struct SchedulerCore {
    tasks: HashMap<TaskId, Task>,
    ready: ReadySet,
    current: Option<TaskId>,
    /// Adopted by a Restart preemption whose cleanup is still running; it
    /// takes the next step without a new selection.
    forced: Option<TaskId>,
    handle: SchedulerHandle,
    next_token: u64,
}

impl SchedulerCore {
    /// A core that is not attached to any loop.
    ///
    /// Bodies can still call `ctx.scheduler().queue_task(..)`, but those
    /// submissions go nowhere; use [`SchedulerCore::queue_task`] instead.
    pub fn new() -> Self {
        Self::with_handle(SchedulerHandle::channel().0)
    }

    pub(crate) fn with_handle(handle: SchedulerHandle) -> Self {
        Self {
            tasks: HashMap::new(),
            ready: ReadySet::new(),
            current: None,
            forced: None,
            handle,
            next_token: 0,
        }
    }

    /// Number of tracked tasks (ready, waiting and parked).
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks in the ready set. Parked parents are not counted.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(Task::state)
    }

    /// Create and track a task directly, bypassing the command channel.
    pub fn queue_task<T>(&mut self, descriptor: WorkDescriptor<T>) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let task = Task::new(self.handle.next_id(), descriptor.inner, None);
        let handle = TaskHandle::new(task.id(), task.subscribe());
        self.insert(task);
        handle
    }

    pub(crate) fn insert(&mut self, task: Task) {
        trace!(task = task.id(), name = %task.name(), "task added to ready set");
        self.ready.insert(task.rank());
        self.tasks.insert(task.id(), task);
    }

    /// Run one iteration of the scheduling loop.
    pub fn turn(&mut self) -> CoreStep {
        let mut commands = Vec::new();

        let id = match self.forced.take() {
            Some(id) if self.ready.contains(id) => {
                self.current = Some(id);
                id
            }
            _ => {
                let Some(front) = self.ready.front() else {
                    return CoreStep::idle(commands);
                };

                let id = self.select(front, &mut commands);
                if !commands.is_empty() {
                    // An abandoned body's cleanup must finish before anything
                    // else runs. Its replacement is stepped right after.
                    self.forced = Some(id);
                    return CoreStep::busy(commands);
                }
                id
            }
        };

        let Some(task) = self.tasks.get_mut(&id) else {
            warn!(task = id, "current task is no longer tracked");
            self.ready.remove(id);
            self.current = None;
            return CoreStep::busy(commands);
        };

        if task.state() == TaskState::AwaitingExternal {
            trace!(task = id, "current task is waiting; nothing to step");
            return CoreStep::idle(commands);
        }

        let outcome = task.step(&self.handle);
        match outcome {
            Err(err) => {
                debug!(task = id, error = %err, "task step failed");
                self.finish(id, Err(err), &mut commands);
            }
            Ok(StepOutcome::Finished(value)) => {
                debug!(task = id, "task finished");
                self.finish(id, Ok(value), &mut commands);
            }
            Ok(StepOutcome::StillActive) => {
                trace!(task = id, "task yielded");
            }
            Ok(StepOutcome::Waiting(op)) => {
                self.next_token += 1;
                let token = self.next_token;
                let (wait, abort) = PendingWait::new(id, token, op);
                task.register_wait(WaitRegistration { token, abort });
                self.ready.insert(task.rank());
                debug!(task = id, token, "task waiting on external operation");
                commands.push(CoreCommand::AwaitOperation(wait));
            }
            Ok(StepOutcome::Spawned(descriptor)) => {
                let child = Task::new(self.handle.next_id(), descriptor, Some(id));
                debug!(
                    task = id,
                    child = child.id(),
                    child_name = %child.name(),
                    child_priority = %child.priority(),
                    "task parked on sub-task"
                );
                self.ready.remove(id);
                self.insert(child);
            }
        }

        CoreStep::busy(commands)
    }

    /// Decide which task runs this turn, applying the current task's
    /// interrupt policy if `front` outranks it.
    fn select(&mut self, front: TaskId, commands: &mut Vec<CoreCommand>) -> TaskId {
        let Some(current) = self.current else {
            self.current = Some(front);
            return front;
        };
        if current == front {
            return current;
        }

        let Some(task) = self.tasks.get_mut(&current) else {
            self.current = Some(front);
            return front;
        };

        if task.state() == TaskState::AwaitingSubtask {
            self.current = Some(front);
            return front;
        }

        let policy = task.interrupt();
        if !policy.allows_interruption() {
            return current;
        }

        if policy == InterruptPolicy::Restart {
            debug!(task = current, by = front, "task preempted; will restart");
            if let Some(cleanup) = task.reset() {
                commands.push(CoreCommand::Cleanup {
                    task: current,
                    cleanup,
                    then: None,
                });
            }
            self.ready.insert(task.rank());
        } else {
            debug!(task = current, by = front, "task preempted; will resume");
        }
        self.current = Some(front);
        front
    }

    /// Take a task out of the scheduler for good and publish its outcome.
    fn finish(&mut self, id: TaskId, outcome: Outcome, commands: &mut Vec<CoreCommand>) {
        self.ready.remove(id);
        if self.current == Some(id) {
            self.current = None;
        }
        let Some(mut task) = self.tasks.remove(&id) else {
            return;
        };

        let cleanup = task.reset();
        task.mark_done();
        if let Some(parent) = task.parent() {
            self.restore_parent(parent, id, outcome.clone());
        }

        let settlement = Settlement {
            task: id,
            settler: task.into_settler(),
            outcome,
        };
        match cleanup {
            Some(cleanup) => commands.push(CoreCommand::Cleanup {
                task: id,
                cleanup,
                then: Some(settlement),
            }),
            None => settlement.apply(),
        }
    }

    fn restore_parent(&mut self, parent: TaskId, child: TaskId, outcome: Outcome) {
        if let Some(task) = self.tasks.get_mut(&parent) {
            if task.resume_subtask(outcome) {
                debug!(task = parent, child, "sub-task done; parent runnable again");
                self.ready.insert(task.rank());
                return;
            }
        }
        debug!(task = parent, child, "parent gone; sub-task result discarded");
    }

    /// Feed a settled external operation back into its task.
    pub fn settle_operation(&mut self, settled: SettledOperation) {
        let SettledOperation {
            task: id,
            token,
            result,
        } = settled;

        if let Some(task) = self.tasks.get_mut(&id) {
            if task.resume_operation(token, result) {
                trace!(task = id, token, "external operation settled");
                self.ready.insert(task.rank());
                return;
            }
        }
        debug!(task = id, token, "discarding stale operation result");
    }

    /// Cancel every tracked task matching `predicate`.
    ///
    /// Returns whether anything was removed, plus the cleanups to await.
    /// Results of tasks with a cleanup are published only after it ran.
    pub fn remove_tasks<P>(&mut self, predicate: P, reason: TaskError) -> (bool, Vec<CoreCommand>)
    where
        P: Fn(&TaskInfo<'_>) -> bool,
    {
        let mut matched: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|task| predicate(&task.info()))
            .map(Task::id)
            .collect();
        matched.sort_unstable();

        // The current task goes last.
        if let Some(current) = self.current {
            if let Some(pos) = matched.iter().position(|&id| id == current) {
                matched.remove(pos);
                matched.push(current);
            }
        }

        let mut commands = Vec::new();
        for &id in &matched {
            debug!(task = id, reason = %reason, "removing task");
            self.finish(id, Err(reason.clone()), &mut commands);
        }

        (!matched.is_empty(), commands)
    }

    /// Oldest tracked task matching `predicate`, with a receiver for its
    /// result.
    pub(crate) fn find_task<P>(
        &self,
        predicate: P,
    ) -> Option<(TaskId, tokio::sync::watch::Receiver<Option<Outcome>>)>
    where
        P: Fn(&TaskInfo<'_>) -> bool,
    {
        self.tasks
            .values()
            .filter(|task| predicate(&task.info()))
            .min_by_key(|task| {
                let rank = task.rank();
                (rank.created, rank.id)
            })
            .map(|task| (task.id(), task.subscribe()))
    }
}

impl Default for SchedulerCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("tracked", &self.tasks.len())
            .field("ready", &self.ready.len())
            .field("current", &self.current)
            .finish()
    }
}
