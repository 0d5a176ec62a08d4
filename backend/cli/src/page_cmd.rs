//! `stateforge page`: refresh, then load more until the source runs dry.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info};

use stateforge_config::StateforgeConfig;
use stateforge_plugins::{
    Host, Intent, IntentDispatcher, IntentHandler, LoadOptions, PagePlugin, PageRequest, PageState,
};

use crate::source::{SourceSettings, UserSource};
use crate::terminal_output::{note_error, note_info, note_success, note_warn, page_table};

/// Consecutive failed loads before the demo gives up.
const MAX_FAILURES: u32 = 3;

pub enum UsersIntent {
    Refresh,
    LoadMore,
}

impl Intent for UsersIntent {}

/// Screen-level owner of the user list.
pub struct UsersScreen {
    plugin: Arc<PagePlugin<String>>,
    options: LoadOptions,
}

#[async_trait]
impl IntentHandler for UsersScreen {
    type Intent = UsersIntent;

    async fn handle_intent(&self, intent: UsersIntent) {
        let result = match intent {
            UsersIntent::Refresh => self.plugin.refresh(self.options),
            UsersIntent::LoadMore => self.plugin.load_more(self.options),
        };
        if let Err(e) = result {
            error!(error = %e, "Page intent failed");
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<PageState<String>>, into: &mut Vec<PageState<String>>) {
    while let Ok(state) = rx.try_recv() {
        into.push(state);
    }
}

/// Run the paging session and return every published state in order.
pub async fn session(
    settings: SourceSettings,
    options: LoadOptions,
) -> Result<Vec<PageState<String>>> {
    let source = Arc::new(UserSource::new(settings));
    let host = Host::new();
    let plugin = host.register(Arc::new(PagePlugin::with_initial(
        Vec::new(),
        settings.refresh_page,
        move |request: PageRequest| {
            let source = source.clone();
            async move { source.load_page(request).await }
        },
    )))?;
    let dispatcher = IntentDispatcher::new(
        &host,
        Arc::new(UsersScreen {
            plugin: plugin.clone(),
            options,
        }),
    );

    let mut transitions = plugin.transitions();
    let mut states = Vec::new();

    dispatcher.dispatch(UsersIntent::Refresh);
    host.scope().wait_idle().await;
    drain(&mut transitions, &mut states);

    let mut failures = 0;
    loop {
        let state = plugin.value();
        if state.is_failure() {
            failures += 1;
            if failures >= MAX_FAILURES {
                break;
            }
        } else {
            failures = 0;
            if state.has_more != Some(true) {
                break;
            }
        }
        // On an empty list this fetches the first page again.
        dispatcher.dispatch(UsersIntent::LoadMore);
        host.scope().wait_idle().await;
        drain(&mut transitions, &mut states);
    }

    info!(
        items = plugin.value().data.len(),
        page = plugin.current_page(),
        "Paging session finished"
    );
    host.destroy()?;
    Ok(states)
}

pub async fn run(config: &StateforgeConfig, pages: Option<u32>) -> Result<()> {
    let mut settings = SourceSettings::from_config(config);
    if let Some(pages) = pages {
        settings.pages = pages;
    }
    let options = LoadOptions::default().with_notify_loading(config.notify_loading());

    note_info(&format!(
        "Paging {} page(s) of {} users, {}ms per page",
        settings.pages,
        settings.page_size,
        settings.latency.as_millis()
    ));
    let states = session(settings, options).await?;
    print!("{}", page_table(&states));

    let Some(last) = states.last() else {
        note_warn("No state was published");
        return Ok(());
    };
    if last.is_success_empty() {
        note_warn("Source returned no users");
    } else if last.is_failure_empty() {
        note_error(&format!("Nothing loaded: {}", outcome_error(last)));
    } else if last.is_failure() {
        note_warn(&format!(
            "Stopped after {MAX_FAILURES} failed loads with {} users: {}",
            last.data.len(),
            outcome_error(last)
        ));
    } else {
        note_success(&format!("Loaded {} users", last.data.len()));
    }
    Ok(())
}

fn outcome_error(state: &PageState<String>) -> String {
    state.failure().map(ToString::to_string).unwrap_or_default()
}
