//! Payload-less load channel.
//!
//! Same gating and single-flight rules as [`DataPlugin`](crate::DataPlugin),
//! but the caller owns whatever the load produces. Only `is_loading` is
//! published.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use stateforge_core::{LoadState, PluginError, Stater};
use stateforge_logging::{EventLogger, LoadEvent};

use crate::engine::{catch_panic, LoadEngine, LoadOptions};
use crate::lifecycle::{Plugin, PluginId, PluginSupport};

pub struct LoadPlugin {
    engine: Arc<LoadEngine>,
    stater: Arc<Stater<LoadState>>,
}

impl LoadPlugin {
    pub fn new() -> Self {
        Self::with_observer("load", |_| {})
    }

    /// Build a channel whose loading flag is also reported to `observer`.
    ///
    /// `observer` runs synchronously inside every flag change, in the same
    /// critical section as the guard check, so a composite can mirror the
    /// flag into its own state without lag.
    pub fn with_observer(
        name: impl Into<String>,
        observer: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        let stater = Arc::new(Stater::new(LoadState::default()));
        let sink = stater.clone();
        let engine = LoadEngine::new(
            name,
            Box::new(move |is_loading| {
                sink.update(|_| LoadState { is_loading });
                observer(is_loading);
            }),
        );
        Self {
            engine: Arc::new(engine),
            stater,
        }
    }

    /// Run `on_load` if the host and `can_load` allow it, superseding any load
    /// in flight. A panic in `on_load` is logged as a failed load and the
    /// loading flag still clears.
    pub fn load<C, F, Fut>(
        &self,
        options: LoadOptions,
        can_load: C,
        on_load: F,
    ) -> Result<(), PluginError>
    where
        C: FnOnce() -> bool,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let engine = self.engine.clone();
        self.engine.load(options, can_load, async move {
            if let Err(error) = catch_panic(async move { on_load().await }).await {
                EventLogger::log(
                    engine.core().name(),
                    LoadEvent::Failed {
                        page: None,
                        error: error.to_string(),
                    },
                );
            }
        })
    }

    pub fn cancel_load(&self) {
        self.engine.cancel();
    }

    /// Cancel the load in flight and wait until it has fully unwound.
    pub async fn cancel_load_and_wait(&self) {
        self.engine.cancel_and_wait().await;
    }

    pub fn is_loading(&self) -> bool {
        self.stater.with(|s| s.is_loading)
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn value(&self) -> LoadState {
        self.stater.value()
    }

    pub fn state(&self) -> watch::Receiver<LoadState> {
        self.stater.subscribe()
    }

    pub fn transitions(&self) -> broadcast::Receiver<LoadState> {
        self.stater.transitions()
    }
}

impl Default for LoadPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for LoadPlugin {
    fn id(&self) -> PluginId {
        self.engine.core().id()
    }

    fn name(&self) -> &str {
        self.engine.core().name()
    }

    fn notify_init(&self, support: Arc<dyn PluginSupport>) -> Result<(), PluginError> {
        self.engine.core().init(support)
    }

    fn notify_destroy(&self) {
        self.engine.cancel();
    }
}
