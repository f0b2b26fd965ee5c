// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::core::{CoreCommand, SchedulerCore};
use crate::engine::pending::PendingOps;
use crate::engine::{Command, SchedulerHandle};
use crate::errors::{Result, SchedError, TaskError};
use crate::task::{TaskHandle, TaskInfo, WorkDescriptor};

/// A cooperative priority scheduler.
///
/// All task bodies run on a single loop task, one step at a time. The loop
/// waits on pending operations for suspended tasks, so their waits overlap
/// while their code never does.
///
/// ```ignore
/// let mut scheduler = Scheduler::new();
/// let answer = scheduler.queue_task(WorkDescriptor::new(Priority::Normal, |_ctx| async {
///     Ok(42u32)
/// }));
/// scheduler.start()?;
/// assert_eq!(answer.await?, 42);
/// scheduler.stop().await?;
/// ```
pub struct Scheduler {
    handle: SchedulerHandle,
    lifecycle: Lifecycle,
}

enum Lifecycle {
    NotStarted(Box<SchedulerLoop>),
    Running {
        stop_tx: watch::Sender<bool>,
        join: JoinHandle<Box<SchedulerLoop>>,
    },
    /// The loop state is kept so in-flight handles stay pending instead of
    /// observing a dropped scheduler.
    Stopped(Option<Box<SchedulerLoop>>),
}

impl Scheduler {
    pub fn new() -> Self {
        let (handle, commands) = SchedulerHandle::channel();
        let core = SchedulerCore::with_handle(handle.clone());
        let state = SchedulerLoop {
            core,
            commands,
            pending: PendingOps::new(),
        };

        Self {
            handle,
            lifecycle: Lifecycle::NotStarted(Box::new(state)),
        }
    }

    /// Cloneable submission API, usable from other tasks and threads.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// See [`SchedulerHandle::queue_task`].
    pub fn queue_task<T>(&self, descriptor: WorkDescriptor<T>) -> TaskHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.handle.queue_task(descriptor)
    }

    /// See [`SchedulerHandle::remove_tasks`].
    pub fn remove_tasks<P>(
        &self,
        predicate: P,
        reason: Option<TaskError>,
    ) -> impl Future<Output = Result<bool>> + Send + use<P>
    where
        P: Fn(&TaskInfo<'_>) -> bool + Send + 'static,
    {
        self.handle.remove_tasks(predicate, reason)
    }

    /// See [`SchedulerHandle::find_task`].
    pub fn find_task<T, P>(
        &self,
        predicate: P,
    ) -> impl Future<Output = Result<Option<TaskHandle<T>>>> + Send + use<T, P>
    where
        T: Clone + Send + Sync + 'static,
        P: Fn(&TaskInfo<'_>) -> bool + Send + 'static,
    {
        self.handle.find_task(predicate)
    }

    /// Spawn the loop onto the current Tokio runtime.
    ///
    /// A scheduler runs at most once: starting it again fails with
    /// [`SchedError::AlreadyRunning`] or, after `stop()`, [`SchedError::Stopped`].
    pub fn start(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped(None)) {
            Lifecycle::NotStarted(state) => {
                let (stop_tx, stop_rx) = watch::channel(false);
                let join = tokio::spawn(state.run(stop_rx));
                self.lifecycle = Lifecycle::Running { stop_tx, join };
                Ok(())
            }
            running @ Lifecycle::Running { .. } => {
                self.lifecycle = running;
                Err(SchedError::AlreadyRunning)
            }
            stopped @ Lifecycle::Stopped(_) => {
                self.lifecycle = stopped;
                Err(SchedError::Stopped)
            }
        }
    }

    /// Ask the loop to exit after its current step and wait until it has.
    ///
    /// In-flight tasks are neither settled nor cancelled; their handles stay
    /// pending for as long as this `Scheduler` is alive.
    pub async fn stop(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped(None)) {
            Lifecycle::NotStarted(mut state) => {
                info!("scheduler stopped before it was started");
                state.close();
                self.lifecycle = Lifecycle::Stopped(Some(state));
                Ok(())
            }
            Lifecycle::Running { stop_tx, join } => {
                let _ = stop_tx.send(true);
                let mut state = join.await?;
                state.close();
                self.lifecycle = Lifecycle::Stopped(Some(state));
                Ok(())
            }
            stopped @ Lifecycle::Stopped(_) => {
                self.lifecycle = stopped;
                Ok(())
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.lifecycle {
            Lifecycle::NotStarted(_) => "not started",
            Lifecycle::Running { .. } => "running",
            Lifecycle::Stopped(_) => "stopped",
        };
        f.debug_struct("Scheduler")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Everything the loop task owns.
struct SchedulerLoop {
    core: SchedulerCore,
    commands: mpsc::UnboundedReceiver<Command>,
    pending: PendingOps,
}

impl SchedulerLoop {
    /// Main loop.
    ///
    /// - Applies queued commands and settled operations between steps.
    /// - Runs one core turn and executes the commands it returns.
    /// - When the core is idle, sleeps until a command, a settled operation
    ///   or a stop request arrives.
    async fn run(mut self: Box<Self>, mut stop: watch::Receiver<bool>) -> Box<Self> {
        info!("scheduler loop started");

        loop {
            if *stop.borrow() || stop.has_changed().is_err() {
                break;
            }

            while let Ok(command) = self.commands.try_recv() {
                self.apply(command).await;
            }
            for settled in self.pending.drain_settled() {
                self.core.settle_operation(settled);
            }

            let step = self.core.turn();
            self.execute(step.commands).await;

            if !step.idle {
                // Let timers and other Tokio tasks make progress between steps.
                tokio::task::yield_now().await;
                continue;
            }

            debug!(
                tracked = self.core.len(),
                waiting_on = self.pending.len(),
                "scheduler idle"
            );

            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                Some(command) = self.commands.recv() => self.apply(command).await,
                settled = self.pending.next_settled() => self.core.settle_operation(settled),
            }
        }

        info!(
            tracked = self.core.len(),
            waiting_on = self.pending.len(),
            "scheduler loop stopped"
        );
        self
    }

    /// Refuse further requests. Tasks submitted before the stop are kept
    /// (unsettled); pending lookups and removals fail with `LoopClosed`.
    fn close(&mut self) {
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Queue(task) = command {
                self.core.insert(task);
            }
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::Queue(task) => self.core.insert(task),
            Command::Remove {
                predicate,
                reason,
                reply,
            } => {
                let (removed, commands) = self.core.remove_tasks(predicate, reason);
                self.execute(commands).await;
                let _ = reply.send(removed);
            }
            Command::Find { predicate, reply } => {
                let _ = reply.send(self.core.find_task(predicate));
            }
        }
    }

    async fn execute(&mut self, commands: Vec<CoreCommand>) {
        for command in commands {
            match command {
                CoreCommand::AwaitOperation(wait) => {
                    trace!(task = wait.task(), "polling operation for task");
                    self.pending.push(wait);
                }
                CoreCommand::Cleanup {
                    task,
                    cleanup,
                    then,
                } => {
                    match AssertUnwindSafe(cleanup).catch_unwind().await {
                        Ok(Ok(())) => debug!(task, "cleanup finished"),
                        Ok(Err(err)) => warn!(task, error = %err, "cleanup failed"),
                        Err(_) => warn!(task, "cleanup panicked"),
                    }
                    if let Some(settlement) = then {
                        debug!(task = settlement.task(), "publishing result after cleanup");
                        settlement.apply();
                    }
                }
            }
        }
    }
}
