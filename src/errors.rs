// src/errors.rs

//! Crate-wide error types.
//!
//! - [`SchedError`] covers the scheduler lifecycle and workload loading.
//! - [`TaskError`] is what a task's result future rejects with. It is `Clone`
//!   because a single result can be observed through several handles.

use std::sync::Arc;

use thiserror::Error;

use crate::engine::TaskId;
use crate::types::Priority;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in spawn graph: {0}")]
    SpawnCycle(String),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler has been stopped and cannot be restarted")]
    Stopped,

    #[error("scheduler loop is gone; request was not processed")]
    LoopClosed,

    #[error("scheduler loop terminated abnormally: {0}")]
    LoopAborted(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SchedError>;

/// Why a task's result future rejected.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The task body returned an error.
    #[error("task failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    /// A pending operation the body waited on failed. The body sees this
    /// from `TaskContext::wait_for` and decides what to do with it.
    #[error("pending operation failed: {0:#}")]
    Operation(Arc<anyhow::Error>),

    /// The task was removed via `remove_tasks`.
    #[error("task cancelled: {0}")]
    Cancelled(String),

    /// The body tried to spawn-and-wait on a less urgent sub-task.
    #[error("cannot wait on a {child} priority sub-task from a {parent} priority task")]
    PriorityInversion { parent: Priority, child: Priority },

    #[error("task {0} was stepped while parked on a sub-task")]
    SteppedWhileParked(TaskId),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task result is not of the requested type {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("scheduler was dropped before the task settled")]
    SchedulerDropped,

    #[error("internal scheduler error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Default reason used when `remove_tasks` is called without one.
    pub fn cancelled() -> Self {
        TaskError::Cancelled("task was removed from the scheduler".to_string())
    }

    /// Wrap an error returned by a task body.
    ///
    /// If the body propagated a `TaskError` (e.g. a failed sub-task via `?`),
    /// that error is kept as-is so callers can still match on it.
    pub fn from_body(err: anyhow::Error) -> Self {
        match err.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(other) => TaskError::Failed(Arc::new(other)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled(_))
    }
}
