//! Single-flight, cancel-and-replace task runner.
//!
//! A new `mutate` call always supersedes the running one: the previous block is
//! cancelled and fully dropped (its drop guards included) before the new block
//! starts. Calls never queue behind each other.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Cancelled;

#[derive(Default)]
struct Current {
    next_id: u64,
    running: Option<(u64, CancellationToken)>,
}

/// Claim on the mutator slot returned by [`Mutator::begin`].
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Guarantees at most one running block per instance.
#[derive(Default)]
pub struct Mutator {
    slot: tokio::sync::Mutex<()>,
    current: Mutex<Current>,
}

impl Mutator {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> MutexGuard<'_, Current> {
        // The critical sections never panic, so a poisoned lock still holds
        // consistent data.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the slot for a new block, cancelling whichever block holds it.
    ///
    /// Supersession is decided here, synchronously, so the order of `begin`
    /// calls is the order in which blocks replace each other even when the
    /// tasks that run them are polled out of order.
    pub fn begin(&self) -> Ticket {
        let token = CancellationToken::new();
        let mut current = self.current();
        let id = current.next_id;
        current.next_id += 1;
        if let Some((previous, old)) = current.running.replace((id, token.clone())) {
            trace!(previous, next = id, "Superseding running block");
            old.cancel();
        }
        Ticket { id, token }
    }

    /// Wait for the previous block to unwind, then run `block` under `ticket`.
    ///
    /// Returns `Err(Cancelled)` if the ticket is cancelled or superseded,
    /// whether it was still waiting for the slot or already running. `block`
    /// is dropped before the slot is released in every case.
    pub async fn run<F>(&self, ticket: Ticket, block: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        let Ticket { id, token } = ticket;
        let result = {
            let slot = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                guard = self.slot.lock() => Some(guard),
            };
            match slot {
                Some(_slot) if !token.is_cancelled() => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(Cancelled),
                        output = block => Ok(output),
                    }
                }
                _ => {
                    drop(block);
                    Err(Cancelled)
                }
            }
        };

        let mut current = self.current();
        if current.running.as_ref().is_some_and(|(running, _)| *running == id) {
            current.running = None;
        }
        result
    }

    /// Cancel the running block, wait for it to unwind, then run `block`.
    pub async fn mutate<F>(&self, block: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        let ticket = self.begin();
        self.run(ticket, block).await
    }

    /// Signal cancellation of the running block without scheduling a replacement.
    pub fn cancel(&self) {
        if let Some((id, token)) = self.current().running.take() {
            trace!(id, "Cancelling running block");
            token.cancel();
        }
    }

    /// Cancel the running block and wait until it has fully unwound.
    pub async fn cancel_and_wait(&self) {
        self.cancel();
        drop(self.slot.lock().await);
    }

    /// Whether a block currently holds the slot.
    pub fn is_running(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct OnDrop<F: FnMut()>(F);

    impl<F: FnMut()> Drop for OnDrop<F> {
        fn drop(&mut self) {
            (self.0)();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutate_runs_block() {
        let mutator = Mutator::new();
        let out = mutator.mutate(async { 7 }).await;
        assert_eq!(out, Ok(7));
        assert!(!mutator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_call_supersedes_running_block() {
        let mutator = Arc::new(Mutator::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let first = {
            let mutator = mutator.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                mutator
                    .mutate(async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        1
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(mutator.is_running());

        let second = mutator
            .mutate(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                completed.fetch_add(10, Ordering::SeqCst);
                2
            })
            .await;

        assert_eq!(first.await.unwrap(), Err(Cancelled));
        assert_eq!(second, Ok(2));
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_runs_before_replacement_starts() {
        let mutator = Arc::new(Mutator::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let mutator = mutator.clone();
            let log = log.clone();
            tokio::spawn(async move {
                mutator
                    .mutate(async move {
                        let _cleanup = OnDrop(|| log.lock().unwrap().push("first cleanup"));
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let log2 = log.clone();
        mutator
            .mutate(async move { log2.lock().unwrap().push("second start") })
            .await
            .unwrap();

        assert!(first.await.unwrap().is_err());
        assert_eq!(*log.lock().unwrap(), vec!["first cleanup", "second start"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_replacement() {
        let mutator = Arc::new(Mutator::new());
        let task = {
            let mutator = mutator.clone();
            tokio::spawn(async move {
                mutator
                    .mutate(tokio::time::sleep(Duration::from_secs(10)))
                    .await
            })
        };
        tokio::task::yield_now().await;

        mutator.cancel_and_wait().await;
        assert!(!mutator.is_running());
        assert_eq!(task.await.unwrap(), Err(Cancelled));

        // A cancel with nothing running is a no-op.
        mutator.cancel();
        assert_eq!(mutator.mutate(async { "again" }).await, Ok("again"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_order_decides_supersession() {
        let mutator = Mutator::new();
        let older = mutator.begin();
        let newer = mutator.begin();
        assert!(older.is_cancelled());
        assert!(newer.id() > older.id());

        // The newer ticket runs first; the older one must not run after it.
        assert_eq!(mutator.run(newer, async { "newer" }).await, Ok("newer"));
        assert_eq!(mutator.run(older, async { "older" }).await, Err(Cancelled));
    }
}
