//! Single-resource load plugin.
//!
//! Runs one async load producing `T` and exposes `{data, result, is_loading}`.
//! A new load supersedes the one in flight. A failed load keeps the previous
//! data and only records the failure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

use stateforge_core::{DataState, LoadError, PluginError, Stater};
use stateforge_logging::{EventLogger, LoadEvent};

use crate::engine::{catch_panic, LoadEngine, LoadOptions};
use crate::lifecycle::{Plugin, PluginId, PluginSupport};
use crate::BoxLoadFuture;

type DataLoader<T> = Arc<dyn Fn() -> BoxLoadFuture<anyhow::Result<T>> + Send + Sync>;
type DataGuard<T> = Arc<dyn Fn(&DataState<T>) -> bool + Send + Sync>;

pub struct DataPlugin<T> {
    engine: Arc<LoadEngine>,
    stater: Arc<Stater<DataState<T>>>,
    on_load: DataLoader<T>,
    can_load: DataGuard<T>,
}

impl<T> std::fmt::Debug for DataPlugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPlugin").finish_non_exhaustive()
    }
}

impl<T> DataPlugin<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new<F, Fut>(initial: T, on_load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let stater = Arc::new(Stater::new(DataState::new(initial)));
        let sink = stater.clone();
        let engine = LoadEngine::new(
            "data",
            Box::new(move |is_loading| {
                sink.update(|s| DataState {
                    is_loading,
                    ..s.clone()
                });
            }),
        );
        Self {
            engine: Arc::new(engine),
            stater,
            on_load: Arc::new(move || -> BoxLoadFuture<anyhow::Result<T>> { Box::pin(on_load()) }),
            can_load: Arc::new(|_: &DataState<T>| true),
        }
    }

    /// Default guard evaluated against the current snapshot on every load.
    pub fn with_can_load(
        mut self,
        can_load: impl Fn(&DataState<T>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.can_load = Arc::new(can_load);
        self
    }

    /// Load with the default guard.
    pub fn load(&self, options: LoadOptions) -> Result<(), PluginError> {
        let can_load = self.can_load.clone();
        self.load_if(options, move |state| can_load(state))
    }

    /// Load with `can_load` replacing the default guard for this call.
    pub fn load_if(
        &self,
        options: LoadOptions,
        can_load: impl FnOnce(&DataState<T>) -> bool,
    ) -> Result<(), PluginError> {
        let stater = self.stater.clone();
        let on_load = self.on_load.clone();
        let engine = self.engine.clone();
        self.engine.load(
            options,
            || self.stater.with(can_load),
            async move {
                let result = catch_panic(async { on_load().await })
                    .await
                    .and_then(|r| r.map_err(LoadError::from));
                apply_result(&stater, engine.core().name(), result);
            },
        )
    }

    pub fn cancel_load(&self) {
        self.engine.cancel();
    }

    /// Replace `data` with `function(data)`, independent of any load in flight.
    pub fn update(&self, function: impl FnOnce(&T) -> T) {
        self.stater.update(|s| DataState {
            data: function(&s.data),
            result: s.result.clone(),
            is_loading: s.is_loading,
        });
    }

    pub fn value(&self) -> DataState<T> {
        self.stater.value()
    }

    pub fn state(&self) -> watch::Receiver<DataState<T>> {
        self.stater.subscribe()
    }

    pub fn state_stream(&self) -> WatchStream<DataState<T>> {
        self.stater.stream()
    }

    pub fn transitions(&self) -> broadcast::Receiver<DataState<T>> {
        self.stater.transitions()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }
}

fn apply_result<T>(stater: &Stater<DataState<T>>, plugin: &str, result: Result<T, LoadError>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    match result {
        Ok(data) => {
            stater.update(|s| DataState {
                data,
                result: Some(Ok(())),
                is_loading: s.is_loading,
            });
        }
        Err(error) => {
            EventLogger::log(
                plugin,
                LoadEvent::Failed {
                    page: None,
                    error: error.to_string(),
                },
            );
            stater.update(|s| DataState {
                result: Some(Err(error)),
                ..s.clone()
            });
        }
    }
}

impl<T> Plugin for DataPlugin<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
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
