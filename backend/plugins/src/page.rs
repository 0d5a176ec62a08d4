//! Paginated list plugin.
//!
//! Two [`LoadPlugin`] channels, refresh and load-more, feed one shared list.
//! Each channel's loading flag is mirrored into [`PageState`] as
//! `is_refreshing` / `is_loading_more`. Starting a refresh cancels the
//! load-more channel and waits for it to unwind before fetching, so a stale
//! tail page can never land after the reset.

use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use stateforge_core::{LoadResult, PageState, PluginError, Stater};
use stateforge_logging::{EventLogger, LoadEvent};

use crate::engine::{catch_panic, LoadOptions};
use crate::lifecycle::{Plugin, PluginCore, PluginId, PluginSupport};
use crate::load::LoadPlugin;
use crate::BoxLoadFuture;

/// Arguments handed to the page loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i32,
    pub is_refresh: bool,
}

type PageLoader<T> = Arc<dyn Fn(PageRequest) -> BoxLoadFuture<LoadResult<T>> + Send + Sync>;

/// State shared between the plugin handle and the load bodies it spawns.
struct Pager<T> {
    name: String,
    refresh_page: i32,
    /// Last page that contributed items.
    cursor: AtomicI32,
    stater: Arc<Stater<PageState<T>>>,
    on_load: PageLoader<T>,
}

impl<T> Pager<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    async fn fetch(&self, page: i32, is_refresh: bool) {
        debug!(plugin = %self.name, page, is_refresh, "Fetching page");
        let request = PageRequest { page, is_refresh };
        let result = catch_panic(async { (self.on_load)(request).await })
            .await
            .unwrap_or_else(|error| LoadResult::failure(error, None));
        self.apply(page, is_refresh, result);
    }

    fn next_page(&self) -> i32 {
        if self.stater.with(|s| s.data.is_empty()) {
            self.refresh_page
        } else {
            self.cursor.load(Ordering::Acquire) + 1
        }
    }

    fn apply(&self, page: i32, is_refresh: bool, result: LoadResult<T>) {
        match result {
            LoadResult::Success {
                data,
                page_size,
                has_more,
            } => {
                let cursor = if is_refresh {
                    self.refresh_page
                } else if page_size > 0 {
                    page
                } else {
                    // Empty page: retry the same page next time.
                    page - 1
                };
                self.cursor.store(cursor, Ordering::Release);
                self.stater.update(|s| PageState {
                    data: data.unwrap_or_else(|| s.data.clone()),
                    page: Some(page),
                    result: Some(Ok(())),
                    is_refresh_result: Some(is_refresh),
                    has_more: has_more.or(s.has_more),
                    ..s.clone()
                });
            }
            LoadResult::Failure { error, data } => {
                EventLogger::log(
                    &self.name,
                    LoadEvent::Failed {
                        page: Some(page),
                        error: error.to_string(),
                    },
                );
                self.stater.update(|s| PageState {
                    data: data.unwrap_or_else(|| s.data.clone()),
                    page: Some(page),
                    result: Some(Err(error)),
                    is_refresh_result: Some(is_refresh),
                    ..s.clone()
                });
            }
            LoadResult::Probe { data: Some(data) } => {
                self.stater.update(|s| PageState {
                    data,
                    ..s.clone()
                });
            }
            LoadResult::Probe { data: None } => {}
        }
    }
}

pub struct PagePlugin<T> {
    core: PluginCore,
    pager: Arc<Pager<T>>,
    refresh: Arc<LoadPlugin>,
    load_more: Arc<LoadPlugin>,
}

impl<T> std::fmt::Debug for PagePlugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePlugin")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<T> PagePlugin<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Empty list, first page `1`.
    pub fn new<F, Fut>(on_load: F) -> Self
    where
        F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        Self::with_initial(Vec::new(), 1, on_load)
    }

    /// `refresh_page` is the page number the data source starts counting at.
    pub fn with_initial<F, Fut>(initial: Vec<T>, refresh_page: i32, on_load: F) -> Self
    where
        F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LoadResult<T>> + Send + 'static,
    {
        let stater = Arc::new(Stater::new(PageState::new(initial)));

        let sink = stater.clone();
        let refresh = LoadPlugin::with_observer("page.refresh", move |is_refreshing| {
            sink.update(|s| PageState {
                is_refreshing,
                ..s.clone()
            });
        });
        let sink = stater.clone();
        let load_more = LoadPlugin::with_observer("page.load_more", move |is_loading_more| {
            sink.update(|s| PageState {
                is_loading_more,
                ..s.clone()
            });
        });

        let on_load: PageLoader<T> =
            Arc::new(move |request| -> BoxLoadFuture<LoadResult<T>> { Box::pin(on_load(request)) });

        Self {
            core: PluginCore::new("page"),
            pager: Arc::new(Pager {
                name: "page".to_string(),
                refresh_page,
                cursor: AtomicI32::new(refresh_page - 1),
                stater,
                on_load,
            }),
            refresh: Arc::new(refresh),
            load_more: Arc::new(load_more),
        }
    }

    /// Reload from `refresh_page`. Always allowed unless the host blocks it.
    pub fn refresh(&self, options: LoadOptions) -> Result<(), PluginError> {
        self.refresh_if(options, |_| true)
    }

    pub fn refresh_if(
        &self,
        options: LoadOptions,
        can_load: impl FnOnce(&PageState<T>) -> bool,
    ) -> Result<(), PluginError> {
        self.core.support()?;
        let pager = self.pager.clone();
        let load_more = self.load_more.clone();
        self.refresh.load(
            options,
            || self.pager.stater.with(can_load),
            move || async move {
                load_more.cancel_load_and_wait().await;
                let page = pager.refresh_page;
                pager.fetch(page, true).await;
            },
        )
    }

    /// Fetch the page after the cursor, or `refresh_page` while the list is
    /// empty. Refused while either channel is loading.
    pub fn load_more(&self, options: LoadOptions) -> Result<(), PluginError> {
        self.load_more_if(options, |s| !s.is_refreshing && !s.is_loading_more)
    }

    pub fn load_more_if(
        &self,
        options: LoadOptions,
        can_load: impl FnOnce(&PageState<T>) -> bool,
    ) -> Result<(), PluginError> {
        self.core.support()?;
        let pager = self.pager.clone();
        self.load_more.load(
            options,
            || self.pager.stater.with(can_load),
            move || async move {
                let page = pager.next_page();
                pager.fetch(page, false).await;
            },
        )
    }

    pub fn cancel_refresh(&self) {
        self.refresh.cancel_load();
    }

    pub fn cancel_load_more(&self) {
        self.load_more.cancel_load();
    }

    /// Empty the list. Result, `has_more` and the cursor are untouched.
    pub fn clear_data(&self) {
        self.pager.stater.update(|s| PageState {
            data: Vec::new(),
            ..s.clone()
        });
    }

    pub fn refresh_page(&self) -> i32 {
        self.pager.refresh_page
    }

    /// Last page that contributed items; `refresh_page - 1` before any.
    pub fn current_page(&self) -> i32 {
        self.pager.cursor.load(Ordering::Acquire)
    }

    pub fn value(&self) -> PageState<T> {
        self.pager.stater.value()
    }

    pub fn state(&self) -> watch::Receiver<PageState<T>> {
        self.pager.stater.subscribe()
    }

    pub fn state_stream(&self) -> WatchStream<PageState<T>> {
        self.pager.stater.stream()
    }

    pub fn transitions(&self) -> broadcast::Receiver<PageState<T>> {
        self.pager.stater.transitions()
    }
}

impl<T> Plugin for PagePlugin<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> PluginId {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn notify_init(&self, support: Arc<dyn PluginSupport>) -> Result<(), PluginError> {
        let children: [Arc<dyn Plugin>; 2] = [self.refresh.clone(), self.load_more.clone()];
        self.core.init_with_children(support, &children)
    }

    fn notify_destroy(&self) {
        self.refresh.cancel_load();
        self.load_more.cancel_load();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;
    use std::time::Duration;

    fn pages(total: i32) -> PagePlugin<i32> {
        PagePlugin::new(move |request: PageRequest| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if request.page > total {
                return LoadResult::success(None, 0, Some(false));
            }
            let data: Vec<i32> = (1..=request.page).collect();
            LoadResult::success(Some(data), 1, Some(request.page < total))
        })
    }

    #[test]
    fn test_refresh_before_init_fails() {
        let plugin = pages(3);
        let err = plugin.refresh(LoadOptions::default()).unwrap_err();
        assert_eq!(err, PluginError::NotInitialized { plugin: "page".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_registers_both_channels() {
        let host = Host::new();
        host.register(Arc::new(pages(3))).unwrap();
        assert_eq!(host.plugin_count(), 3);
    }

    #[test]
    fn test_failed_child_registration_leaves_page_unbound() {
        let other = Host::new();
        let host = Host::new();
        let plugin = Arc::new(pages(3));
        other.register(plugin.refresh.clone()).unwrap();

        let err = host.register(plugin.clone()).unwrap_err();
        assert_eq!(err, PluginError::AlreadyInitialized { plugin: "page.refresh".into() });
        assert!(!plugin.core.is_initialized());
        assert_eq!(host.plugin_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_on_empty_list_fetches_first_page() {
        let host = Host::new();
        let plugin = host.register(Arc::new(pages(3))).unwrap();
        assert_eq!(plugin.current_page(), 0);

        plugin.load_more(LoadOptions::default()).unwrap();
        assert!(plugin.value().is_loading_more);
        host.scope().wait_idle().await;

        let state = plugin.value();
        assert_eq!(state.data, vec![1]);
        assert_eq!(state.page, Some(1));
        assert_eq!(state.is_refresh_result, Some(false));
        assert!(!state.is_loading_more);
        assert_eq!(plugin.current_page(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_data_keeps_result_and_cursor() {
        let host = Host::new();
        let plugin = host.register(Arc::new(pages(3))).unwrap();
        plugin.refresh(LoadOptions::default()).unwrap();
        host.scope().wait_idle().await;

        plugin.clear_data();
        let state = plugin.value();
        assert!(state.data.is_empty());
        assert!(state.is_success());
        assert_eq!(state.has_more, Some(true));
        assert_eq!(plugin.current_page(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_refresh_page() {
        let host = Host::new();
        let plugin = host
            .register(Arc::new(PagePlugin::with_initial(
                vec![7],
                0,
                |request: PageRequest| async move {
                    LoadResult::success(Some(vec![request.page]), 1, None)
                },
            )))
            .unwrap();
        assert_eq!(plugin.refresh_page(), 0);
        assert_eq!(plugin.current_page(), -1);

        // Non-empty list: load-more targets cursor + 1.
        plugin.load_more(LoadOptions::default()).unwrap();
        host.scope().wait_idle().await;
        assert_eq!(plugin.value().data, vec![0]);
        assert_eq!(plugin.value().has_more, None);
    }
}
