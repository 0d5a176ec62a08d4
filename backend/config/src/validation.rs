//! Config validation with path-qualified messages.

use crate::schema::StateforgeConfig;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &StateforgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_logging(config, &mut report);
    validate_plugins(config, &mut report);
    validate_demo(config, &mut report);
    report
}

fn validate_logging(config: &StateforgeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.error(
                "logging.level",
                format!("Unknown log level '{level}'. Use one of {}", LOG_LEVELS.join(", ")),
            );
        }
    }
}

fn validate_plugins(config: &StateforgeConfig, report: &mut ValidationReport) {
    let Some(plugins) = &config.plugins else { return };
    if let Some(page) = plugins.refresh_page {
        if page < 0 {
            report.warn(
                "plugins.refreshPage",
                format!("refreshPage {page} is negative; most sources count from 0 or 1"),
            );
        }
    }
}

fn validate_demo(config: &StateforgeConfig, report: &mut ValidationReport) {
    let Some(demo) = &config.demo else { return };
    if demo.pages == Some(0) {
        report.error("demo.pages", "pages must be >= 1");
    }
    if demo.page_size == Some(0) {
        report.error("demo.pageSize", "pageSize must be >= 1");
    }
    if let Some(rate) = demo.failure_rate {
        if !(0.0..=1.0).contains(&rate) {
            report.error("demo.failureRate", format!("failureRate {rate} must be within 0..=1"));
        }
    }
    if let Some(latency) = demo.latency_ms {
        if latency > 60_000 {
            report.warn("demo.latencyMs", "Latency above one minute makes the demo look stuck");
        }
    }
}
