//! Shared load gating for the data and load plugins.
//!
//! A request passes three gates in order: host destroyed, host inactive
//! (unless `ignore_active`), then the caller's guard. The guard runs under the
//! gate lock together with the `is_loading = true` publication, so two
//! requests can never both pass a guard that reads the loading flag.
//!
//! The loading flag belongs to the newest notifying request. Each request's
//! drop guard clears it only while it is still the owner, so a superseded
//! request never clears the flag of the request that replaced it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tracing::trace;

use stateforge_core::{Cancelled, LoadError, Mutator, PluginError};
use stateforge_logging::{EventLogger, LoadEvent, RejectReason};

use crate::lifecycle::PluginCore;

/// Per-call options for `load`, `refresh` and `load_more`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Publish the loading flag while the request runs.
    pub notify_loading: bool,
    /// Run even while the host is inactive.
    pub ignore_active: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            notify_loading: true,
            ignore_active: false,
        }
    }
}

impl LoadOptions {
    pub fn with_notify_loading(mut self, notify_loading: bool) -> Self {
        self.notify_loading = notify_loading;
        self
    }

    pub fn with_ignore_active(mut self, ignore_active: bool) -> Self {
        self.ignore_active = ignore_active;
        self
    }
}

#[derive(Default)]
struct Gate {
    next_seq: u64,
    owner: Option<u64>,
}

pub(crate) type LoadingSink = Box<dyn Fn(bool) + Send + Sync>;

pub(crate) struct LoadEngine {
    core: PluginCore,
    mutator: Mutator,
    gate: Mutex<Gate>,
    set_loading: LoadingSink,
}

impl LoadEngine {
    pub(crate) fn new(name: impl Into<String>, set_loading: LoadingSink) -> Self {
        Self {
            core: PluginCore::new(name),
            mutator: Mutator::new(),
            gate: Mutex::new(Gate::default()),
            set_loading,
        }
    }

    pub(crate) fn core(&self) -> &PluginCore {
        &self.core
    }

    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reject(&self, reason: RejectReason) -> Result<(), PluginError> {
        EventLogger::log(self.core.name(), LoadEvent::Rejected { reason });
        Ok(())
    }

    /// Gate the request and, if it passes, run `body` in the host scope under
    /// the mutator. `can_load` must not call back into this plugin.
    pub(crate) fn load<F>(
        self: &Arc<Self>,
        options: LoadOptions,
        can_load: impl FnOnce() -> bool,
        body: F,
    ) -> Result<(), PluginError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let support = self.core.support()?;
        if support.is_destroyed() {
            return self.reject(RejectReason::Destroyed);
        }
        if !options.ignore_active && !support.is_active() {
            return self.reject(RejectReason::Inactive);
        }

        let (seq, ticket) = {
            let mut gate = self.gate();
            if !can_load() {
                drop(gate);
                return self.reject(RejectReason::Guard);
            }
            let seq = gate.next_seq;
            gate.next_seq += 1;
            let ticket = self.mutator.begin();
            if options.notify_loading {
                gate.owner = Some(seq);
                (self.set_loading)(true);
            }
            (seq, ticket)
        };
        EventLogger::log(
            self.core.name(),
            LoadEvent::Started {
                seq,
                notify_loading: options.notify_loading,
            },
        );

        let guard = LoadingGuard {
            engine: self.clone(),
            seq,
        };
        let engine = self.clone();
        let spawned = support.scope().spawn(async move {
            let block = async move {
                let _guard = guard;
                body.await;
            };
            match engine.mutator.run(ticket, block).await {
                Ok(()) => EventLogger::log(engine.core.name(), LoadEvent::Finished { seq }),
                Err(Cancelled) => {
                    EventLogger::log(engine.core.name(), LoadEvent::Cancelled { seq })
                }
            }
        });
        if !spawned {
            // The dropped body already released the loading flag.
            EventLogger::log(self.core.name(), LoadEvent::Cancelled { seq });
        }
        Ok(())
    }

    fn release(&self, seq: u64) {
        let mut gate = self.gate();
        if gate.owner == Some(seq) {
            gate.owner = None;
            (self.set_loading)(false);
        } else {
            trace!(plugin = %self.core.name(), seq, "Loading flag owned by a newer request");
        }
    }

    pub(crate) fn cancel(&self) {
        self.mutator.cancel();
    }

    pub(crate) async fn cancel_and_wait(&self) {
        self.mutator.cancel_and_wait().await;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.mutator.is_running()
    }
}

/// Await a load callback, turning a panic into a [`LoadError`].
pub(crate) async fn catch_panic<T>(callback: impl Future<Output = T>) -> Result<T, LoadError> {
    AssertUnwindSafe(callback).catch_unwind().await.map_err(|payload| {
        let reason = payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        LoadError::msg(format!("load callback panicked: {reason}"))
    })
}

/// Clears the loading flag when the request's block is dropped, whether it
/// completed, was cancelled, or never got the slot.
struct LoadingGuard {
    engine: Arc<LoadEngine>,
    seq: u64,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.engine.release(self.seq);
    }
}
