//! Stateforge configuration schema.
//!
//! Every field is optional on disk; [`crate::apply_all_defaults`] fills the
//! gaps and the accessors below read the resolved values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::defaults::{
    DEFAULT_DEMO_FAILURE_RATE, DEFAULT_DEMO_LATENCY_MS, DEFAULT_DEMO_PAGES, DEFAULT_DEMO_PAGE_SIZE,
    DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_PAGE,
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateforgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Defaults handed to the load plugins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginsConfig>,

    /// Simulated data source used by the demo binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<DemoConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for daily-rolling NDJSON logs; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// JSON console output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    /// First page number of the paged source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_page: Option<i32>,
    /// Publish loading flags by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_loading: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Probability in `0..=1` that a simulated load fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<f64>,
}

impl StateforgeConfig {
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.logging.as_ref().and_then(|l| l.dir.as_ref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn refresh_page(&self) -> i32 {
        self.plugins
            .as_ref()
            .and_then(|p| p.refresh_page)
            .unwrap_or(DEFAULT_REFRESH_PAGE)
    }

    pub fn notify_loading(&self) -> bool {
        self.plugins
            .as_ref()
            .and_then(|p| p.notify_loading)
            .unwrap_or(true)
    }

    pub fn demo_pages(&self) -> u32 {
        self.demo.as_ref().and_then(|d| d.pages).unwrap_or(DEFAULT_DEMO_PAGES)
    }

    pub fn demo_page_size(&self) -> u32 {
        self.demo
            .as_ref()
            .and_then(|d| d.page_size)
            .unwrap_or(DEFAULT_DEMO_PAGE_SIZE)
    }

    pub fn demo_latency_ms(&self) -> u64 {
        self.demo
            .as_ref()
            .and_then(|d| d.latency_ms)
            .unwrap_or(DEFAULT_DEMO_LATENCY_MS)
    }

    pub fn demo_failure_rate(&self) -> f64 {
        self.demo
            .as_ref()
            .and_then(|d| d.failure_rate)
            .unwrap_or(DEFAULT_DEMO_FAILURE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = "plugins:\n  refreshPage: 0\n  notifyLoading: false\ndemo:\n  latencyMs: 250\n";
        let cfg: StateforgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.refresh_page(), 0);
        assert!(!cfg.notify_loading());
        assert_eq!(cfg.demo_latency_ms(), 250);
        assert_eq!(cfg.demo_pages(), DEFAULT_DEMO_PAGES);
    }

    #[test]
    fn empty_sections_are_not_serialized() {
        let yaml = serde_yaml::to_string(&StateforgeConfig::default()).unwrap();
        assert_eq!(yaml.trim(), "{}");
    }
}
