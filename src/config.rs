// Configuration management module
// This file handles the construction-time settings of a metric logger and
// loading them from METRIC_LOGGER_* environment variables
//
// Numan Thabit 2025 Nov

use crate::errors::MetricLoggerError;
use serde::Deserialize;

pub const DEFAULT_NAMESPACE: &str = "aggregate-metric-logger";
pub const DEFAULT_IN_PROGRESS_WARNING_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetricLoggerConfig {
    /// Master switch; a disabled logger records nothing and arms no timer
    pub enabled: bool,
    /// Passed to the log sink, not used by aggregation
    pub namespace: String,
    /// Open measurements above this count at flush time trigger a warning
    pub in_progress_measurement_warning_limit: usize,
}

impl Default for MetricLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            in_progress_measurement_warning_limit: DEFAULT_IN_PROGRESS_WARNING_LIMIT,
        }
    }
}

impl MetricLoggerConfig {
    /// Load from `METRIC_LOGGER_ENABLED`, `METRIC_LOGGER_NAMESPACE` and
    /// `METRIC_LOGGER_IN_PROGRESS_MEASUREMENT_WARNING_LIMIT`.
    ///
    /// Unlike [`Default`], the environment loader leaves the logger off
    /// unless `METRIC_LOGGER_ENABLED=true` is set.
    pub fn from_env() -> Result<Self, MetricLoggerError> {
        Self::load(config::Environment::with_prefix("METRIC_LOGGER"))
    }

    pub fn load(env: config::Environment) -> Result<Self, MetricLoggerError> {
        let cfg = config::Config::builder()
            .set_default("enabled", false)?
            .add_source(env.try_parsing(true))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Same settings under another namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..self.clone()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
