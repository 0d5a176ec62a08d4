//! `stateforge data`: one profile load, superseded halfway by a second one.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use stateforge_config::StateforgeConfig;
use stateforge_plugins::{DataPlugin, DataState, Host, LoadOptions};

use crate::source::{SourceSettings, UserSource};
use crate::terminal_output::{data_table, note_error, note_info, note_success};

pub async fn session(
    settings: SourceSettings,
    options: LoadOptions,
) -> Result<Vec<DataState<String>>> {
    let source = Arc::new(UserSource::new(settings));
    let host = Host::new();
    let plugin = host.plugin(|| {
        DataPlugin::new(String::new(), move || {
            let source = source.clone();
            async move { source.load_profile().await }
        })
    })?;
    let mut transitions = plugin.transitions();

    plugin.load(options)?;
    tokio::time::sleep(settings.latency / 2).await;
    info!("Reloading before the first load finished");
    plugin.load(options)?;
    host.scope().wait_idle().await;

    let mut states = Vec::new();
    while let Ok(state) = transitions.try_recv() {
        states.push(state);
    }
    host.destroy()?;
    Ok(states)
}

pub async fn run(config: &StateforgeConfig) -> Result<()> {
    let settings = SourceSettings::from_config(config);
    let options = LoadOptions::default().with_notify_loading(config.notify_loading());

    note_info("Loading a profile twice; only the second load may land");
    let states = session(settings, options).await?;
    print!("{}", data_table(&states));

    match states.last() {
        Some(last) if last.is_failure() => {
            let error = last.failure().map(ToString::to_string).unwrap_or_default();
            note_error(&format!("Profile load failed: {error}"));
        }
        Some(last) => note_success(&format!("Loaded profile {}", last.data)),
        None => note_error("No state was published"),
    }
    Ok(())
}
