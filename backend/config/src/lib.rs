//! `stateforge-config`: runtime configuration for stateforge hosts.
//!
//! Provides:
//! - Typed config schema (logging, plugin defaults, demo data source)
//! - YAML read/write with atomic backup rotation
//! - Default value application
//! - Validation with path-qualified errors and warnings

pub mod defaults;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use io::{config_dir, config_file_path, load_config, render_config, write_config};
pub use schema::{DemoConfig, LoggingConfig, PluginsConfig, StateforgeConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load a config file, apply defaults and validate it.
///
/// Warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<StateforgeConfig> {
    let config = apply_all_defaults(load_config(path).await?);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("{first} ({} error(s) total)", report.errors.len());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_prepare_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "demo:\n  failureRate: 2.0\n").unwrap();
        let err = load_and_prepare(&path).await.unwrap_err();
        assert!(err.to_string().contains("demo.failureRate"));
    }

    #[tokio::test]
    async fn test_load_and_prepare_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_and_prepare(&config_file_path(dir.path())).await.unwrap();
        assert_eq!(cfg.log_level(), defaults::DEFAULT_LOG_LEVEL);
        assert!(cfg.demo.is_some());
    }
}
