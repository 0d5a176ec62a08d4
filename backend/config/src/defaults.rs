//! Config defaults: fills every unset field of a parsed config.

use crate::schema::{DemoConfig, LoggingConfig, PluginsConfig, StateforgeConfig};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Most paged sources count from one.
pub const DEFAULT_REFRESH_PAGE: i32 = 1;

pub const DEFAULT_DEMO_PAGES: u32 = 3;

pub const DEFAULT_DEMO_PAGE_SIZE: u32 = 10;

pub const DEFAULT_DEMO_LATENCY_MS: u64 = 1_000;

pub const DEFAULT_DEMO_FAILURE_RATE: f64 = 0.0;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: StateforgeConfig) -> StateforgeConfig {
    let config = apply_logging_defaults(config);
    let config = apply_plugin_defaults(config);
    apply_demo_defaults(config)
}

fn apply_logging_defaults(mut config: StateforgeConfig) -> StateforgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.json.is_none() {
        logging.json = Some(false);
    }
    config
}

fn apply_plugin_defaults(mut config: StateforgeConfig) -> StateforgeConfig {
    let plugins = config.plugins.get_or_insert_with(PluginsConfig::default);
    plugins.refresh_page.get_or_insert(DEFAULT_REFRESH_PAGE);
    plugins.notify_loading.get_or_insert(true);
    config
}

fn apply_demo_defaults(mut config: StateforgeConfig) -> StateforgeConfig {
    let demo = config.demo.get_or_insert_with(DemoConfig::default);
    demo.pages.get_or_insert(DEFAULT_DEMO_PAGES);
    demo.page_size.get_or_insert(DEFAULT_DEMO_PAGE_SIZE);
    demo.latency_ms.get_or_insert(DEFAULT_DEMO_LATENCY_MS);
    demo.failure_rate.get_or_insert(DEFAULT_DEMO_FAILURE_RATE);
    config
}
