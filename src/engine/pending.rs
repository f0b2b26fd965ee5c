// src/engine/pending.rs

//! External operations the loop is waiting on for suspended tasks.

use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};

use crate::engine::TaskId;
use crate::errors::TaskError;
use crate::task::state::{OperationValue, PendingOp};

/// An operation that settled, addressed to the wait that registered it.
#[derive(Debug)]
pub struct SettledOperation {
    pub task: TaskId,
    pub token: u64,
    pub(crate) result: Result<OperationValue, TaskError>,
}

/// A registered wait, ready to be polled by the loop.
pub struct PendingWait {
    task: TaskId,
    token: u64,
    op: Abortable<PendingOp>,
}

impl PendingWait {
    /// Wrap `op` so that the returned [`AbortHandle`] can drop it early when
    /// the task is reset or removed.
    pub(crate) fn new(task: TaskId, token: u64, op: PendingOp) -> (Self, AbortHandle) {
        let (abort, registration) = AbortHandle::new_pair();
        let wait = Self {
            task,
            token,
            op: Abortable::new(op, registration),
        };
        (wait, abort)
    }

    pub fn task(&self) -> TaskId {
        self.task
    }
}

impl std::fmt::Debug for PendingWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWait")
            .field("task", &self.task)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// All in-flight waits. Aborted ones are skipped silently.
#[derive(Default)]
pub struct PendingOps {
    inflight: FuturesUnordered<BoxFuture<'static, Option<SettledOperation>>>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    pub fn push(&mut self, wait: PendingWait) {
        let PendingWait { task, token, op } = wait;
        self.inflight.push(
            async move {
                op.await
                    .ok()
                    .map(|result| SettledOperation { task, token, result })
            }
            .boxed(),
        );
    }

    /// Wait for the next operation to settle. Never resolves while empty.
    pub async fn next_settled(&mut self) -> SettledOperation {
        loop {
            match self.inflight.next().await {
                Some(Some(settled)) => return settled,
                Some(None) => continue,
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Operations that already settled, without waiting.
    pub fn drain_settled(&mut self) -> Vec<SettledOperation> {
        let mut settled = Vec::new();
        while let Some(Some(next)) = self.inflight.next().now_or_never() {
            if let Some(op) = next {
                settled.push(op);
            }
        }
        settled
    }
}

impl std::fmt::Debug for PendingOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOps")
            .field("inflight", &self.inflight.len())
            .finish()
    }
}
