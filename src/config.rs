//! Runner and monitor configuration.
//!
//! [`RunnerConfig`] carries the two runtime bounds of a [`TaskRunner`](crate::TaskRunner):
//! `at_least` and `timeout`, both in seconds. Unknown keys are ignored and
//! missing keys default to `0.0`, whether the values come from TOML or from
//! loose key/value options.

use crate::error::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime bounds for a task runner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Minimum seconds the background task keeps running after scope entry.
    pub at_least: f64,
    /// Seconds after which the scope may close even if not done.
    /// `0.0` means no cap beyond `at_least`.
    pub timeout: f64,
}

impl RunnerConfig {
    /// Create a validated config.
    pub fn new(at_least: f64, timeout: f64) -> Result<Self> {
        let config = Self { at_least, timeout };
        config.validate()?;
        Ok(config)
    }

    /// Build a config from loose key/value options.
    ///
    /// Only `at_least` and `timeout` are recognized; other keys are ignored.
    pub fn from_options<I, K>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            match key.as_ref() {
                "at_least" => config.at_least = value,
                "timeout" => config.timeout = value,
                other => tracing::trace!("ignoring unrecognized runner option `{other}`"),
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RunnerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or holds
    /// out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RunnerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates both bounds: finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        check_seconds("at_least", self.at_least)?;
        check_seconds("timeout", self.timeout)?;
        Ok(())
    }

    /// `at_least` as a [`Duration`].
    pub fn at_least_duration(&self) -> Result<Duration> {
        to_duration("at_least", self.at_least)
    }

    /// `timeout` as a [`Duration`].
    pub fn timeout_duration(&self) -> Result<Duration> {
        to_duration("timeout", self.timeout)
    }
}

fn check_seconds(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RunnerError::Config(format!(
            "{name} must be a finite, non-negative number of seconds (got {value})"
        )));
    }
    Ok(())
}

fn to_duration(name: &str, value: f64) -> Result<Duration> {
    check_seconds(name, value)?;
    Duration::try_from_secs_f64(value)
        .map_err(|e| RunnerError::Config(format!("{name} out of range: {e}")))
}

/// Configuration file for the `monitor-run` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Runtime bounds for the monitor's runner.
    pub runner: RunnerConfig,
    /// Pause between samples, in seconds.
    pub interval_secs: f64,
    /// Abort the monitor on the first failing sample.
    pub fail_fast: bool,
    /// Most recent samples kept in memory; older ones are discarded.
    pub max_samples: usize,
}

/// One hour of samples at the default interval.
pub const DEFAULT_MAX_SAMPLES: usize = 3600;

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            interval_secs: 1.0,
            fail_fast: false,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl MonitorConfig {
    /// Load and validate a monitor config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| RunnerError::Config(e.to_string()))?;
        config.runner.validate()?;
        check_seconds("interval_secs", config.interval_secs)?;
        if config.max_samples == 0 {
            return Err(RunnerError::Config(
                "max_samples must be at least 1".to_owned(),
            ));
        }
        Ok(config)
    }

    /// Sampling interval as a [`Duration`].
    pub fn interval(&self) -> Result<Duration> {
        to_duration("interval_secs", self.interval_secs)
    }
}
