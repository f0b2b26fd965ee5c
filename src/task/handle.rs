// src/task/handle.rs

//! Result futures handed out to callers.

use std::any::type_name;
use std::fmt;
use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::engine::TaskId;
use crate::errors::TaskError;
use crate::task::state::Outcome;

/// Producer side of a task's result. Settles at most once.
#[derive(Debug)]
pub(crate) struct Settler {
    tx: watch::Sender<Option<Outcome>>,
}

impl Settler {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish the outcome. Returns `false` if the task had already settled.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(outcome);
                true
            }
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.tx.subscribe()
    }
}

/// Handle to a task's eventual result.
///
/// Await it directly (`handle.await`) or via [`TaskHandle::result`]. Handles
/// are cheap to clone; every clone observes the same result.
pub struct TaskHandle<T> {
    id: TaskId,
    rx: watch::Receiver<Option<Outcome>>,
    _result: PhantomData<fn() -> T>,
}

impl<T> TaskHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(id: TaskId, rx: watch::Receiver<Option<Outcome>>) -> Self {
        Self {
            id,
            rx,
            _result: PhantomData,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// `true` once the task has resolved or rejected.
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Non-blocking peek at the result, `None` while the task is in flight.
    pub fn try_result(&self) -> Option<Result<T, TaskError>> {
        let outcome = self.rx.borrow().clone()?;
        Some(downcast(outcome))
    }

    /// Wait for the task to settle.
    pub async fn result(mut self) -> Result<T, TaskError> {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(guard) => guard.clone(),
            Err(_) => return Err(TaskError::SchedulerDropped),
        };

        match outcome {
            Some(outcome) => downcast(outcome),
            None => Err(TaskError::SchedulerDropped),
        }
    }
}

fn downcast<T>(outcome: Outcome) -> Result<T, TaskError>
where
    T: Clone + 'static,
{
    let value = outcome?;
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or(TaskError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

impl<T> IntoFuture for TaskHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T, TaskError>;
    type IntoFuture = BoxFuture<'static, Result<T, TaskError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.result().boxed()
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: self.rx.clone(),
            _result: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("settled", &self.rx.borrow().is_some())
            .finish()
    }
}
