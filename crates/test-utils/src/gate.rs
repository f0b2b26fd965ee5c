//! A pending operation that tests open by hand.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable, controllable external operation.
///
/// Every call to [`Gate::wait`] returns a fresh future, so a body that is
/// restarted can wait on the same gate again. Once opened (or failed), all
/// current and future waits complete immediately.
#[derive(Clone)]
pub struct Gate<T> {
    state: Arc<watch::Sender<Option<Result<T, String>>>>,
}

impl<T> Gate<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Future suitable for `TaskContext::wait_for`.
    pub fn wait(&self) -> impl Future<Output = anyhow::Result<T>> + Send + use<T> {
        let mut rx = self.state.subscribe();
        async move {
            let settled = rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| anyhow::anyhow!("gate dropped"))?
                .clone();
            match settled {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(anyhow::anyhow!(message)),
                None => Err(anyhow::anyhow!("gate settled without a value")),
            }
        }
    }

    pub fn open(&self, value: T) {
        self.state.send_replace(Some(Ok(value)));
    }

    pub fn fail(&self, message: &str) {
        self.state.send_replace(Some(Err(message.to_string())));
    }

    /// Number of waits currently outstanding.
    pub fn waiters(&self) -> usize {
        self.state.receiver_count()
    }
}

impl<T> Default for Gate<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
