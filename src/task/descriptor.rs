// src/task/descriptor.rs

//! Work descriptors: the immutable configuration a caller submits.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::task::context::TaskContext;
use crate::task::state::SharedValue;
use crate::types::{InterruptPolicy, Priority};

pub(crate) type ErasedBody =
    Box<dyn FnMut(TaskContext) -> BoxFuture<'static, anyhow::Result<SharedValue>> + Send>;

/// Cleanup routine run when a started task is abandoned.
pub type CleanupFuture = BoxFuture<'static, anyhow::Result<()>>;

pub(crate) type CleanupFn = Box<dyn FnMut() -> CleanupFuture + Send>;

/// Describes one unit of work for the scheduler.
///
/// The body is a factory: it is called once when the task first runs and
/// again every time a `Restart` task starts over after being preempted.
///
/// ```ignore
/// let desc = WorkDescriptor::new(Priority::Normal, |ctx: TaskContext| async move {
///     ctx.yield_now().await;
///     Ok(42u32)
/// })
/// .name("answer")
/// .tag("answer:1");
/// ```
pub struct WorkDescriptor<T> {
    pub(crate) inner: ErasedDescriptor,
    _result: PhantomData<fn() -> T>,
}

impl<T> WorkDescriptor<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(priority: Priority, mut body: F) -> Self
    where
        F: FnMut(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let body: ErasedBody = Box::new(move |ctx| {
            let fut = body(ctx);
            async move { fut.await.map(|value| Arc::new(value) as SharedValue) }.boxed()
        });

        Self {
            inner: ErasedDescriptor {
                name: None,
                tag: None,
                priority,
                interrupt: InterruptPolicy::default(),
                body,
                cleanup: None,
            },
            _result: PhantomData,
        }
    }

    /// Diagnostic name, used only in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = Some(name.into());
        self
    }

    /// Lookup key for `find_task` / `remove_tasks` predicates.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.inner.tag = Some(tag.into());
        self
    }

    pub fn interrupt(mut self, policy: InterruptPolicy) -> Self {
        self.inner.interrupt = policy;
        self
    }

    /// Routine awaited whenever the task is abandoned mid-flight
    /// (restart, cancellation, usage error).
    pub fn cleanup<F, Fut>(mut self, mut cleanup: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.cleanup = Some(Box::new(move || cleanup().boxed()));
        self
    }

    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    pub fn interrupt_policy(&self) -> InterruptPolicy {
        self.inner.interrupt
    }

    pub fn task_name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn task_tag(&self) -> Option<&str> {
        self.inner.tag.as_deref()
    }
}

impl<T> fmt::Debug for WorkDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// A descriptor with its result type erased, as stored inside a task.
pub(crate) struct ErasedDescriptor {
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) priority: Priority,
    pub(crate) interrupt: InterruptPolicy,
    pub(crate) body: ErasedBody,
    pub(crate) cleanup: Option<CleanupFn>,
}

impl fmt::Debug for ErasedDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkDescriptor")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("priority", &self.priority)
            .field("interrupt", &self.interrupt)
            .field("cleanup", &self.cleanup.is_some())
            .finish_non_exhaustive()
    }
}
