use std::future::Future;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

/// Structured-concurrency scope owned by a host.
///
/// Tasks spawned here run until they finish or the scope is cancelled, at
/// which point they are dropped at their next suspension point.
///
/// The scope keeps the runtime handle that was current when it was created,
/// so `spawn` works from threads outside the runtime.
#[derive(Clone)]
pub struct TaskScope {
    token: CancellationToken,
    tracker: TaskTracker,
    runtime: Option<Handle>,
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScope {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Launch `future` into the scope.
    ///
    /// Returns `false`, dropping `future`, when the scope is cancelled or no
    /// runtime is reachable: neither a captured one nor one entered by the
    /// calling thread.
    pub fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            debug!("Scope cancelled, dropping spawned task");
            return false;
        }
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            error!("No tokio runtime to run the task on, dropping it");
            return false;
        };
        let token = self.token.clone();
        self.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    _ = future => {}
                }
            },
            &runtime,
        );
        true
    }

    /// Hard-cancel every task in the scope.
    pub fn cancel(&self) {
        self.token.cancel();
        self.tracker.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every spawned task has finished.
    ///
    /// Closes the scope to new tasks only if it was already cancelled; an
    /// active scope is reopened afterwards.
    pub async fn wait_idle(&self) {
        let reopen = !self.tracker.is_closed();
        self.tracker.close();
        self.tracker.wait().await;
        if reopen && !self.token.is_cancelled() {
            self.tracker.reopen();
        }
    }
}
