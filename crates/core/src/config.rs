//! Binder configuration
//!
//! Settings can be built programmatically, read from environment variables,
//! or loaded from a flat `key = value` TOML file.

use crate::error::{BinderError, BinderResult};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Default multiplier for off-screen viewports kept materialized
pub const DEFAULT_RANGE_RATIO: f32 = 4.0;

/// Upper bound on the default number of background workers
pub const MAX_DEFAULT_WORKERS: usize = 4;

/// Configuration for a window scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct BinderConfig {
    /// How many viewports worth of items to keep materialized on each side
    /// of the visible window
    pub range_ratio: f32,

    /// Background materialization threads. `0` disables background threads:
    /// queued jobs run when the owner calls `run_queued_jobs`.
    pub worker_threads: usize,

    /// Longest time an idle worker sleeps before re-checking for shutdown
    pub worker_poll_interval: Duration,

    /// Allow a non-exact cross axis to be resolved from the first item's
    /// measured extent
    pub dynamic_cross_axis: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            range_ratio: DEFAULT_RANGE_RATIO,
            worker_threads: default_worker_threads(),
            worker_poll_interval: Duration::from_millis(50),
            dynamic_cross_axis: false,
        }
    }
}

impl BinderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range_ratio(mut self, ratio: f32) -> Self {
        self.range_ratio = ratio;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.worker_poll_interval = interval;
        self
    }

    pub fn with_dynamic_cross_axis(mut self, enabled: bool) -> Self {
        self.dynamic_cross_axis = enabled;
        self
    }

    /// Rejects settings no scheduler can run with.
    pub fn validate(&self) -> BinderResult<()> {
        if !self.range_ratio.is_finite() || self.range_ratio <= 0.0 {
            return Err(BinderError::InvalidConfig(format!(
                "range ratio must be a positive number, got {}",
                self.range_ratio
            )));
        }
        if self.worker_threads > 0 && self.worker_poll_interval.is_zero() {
            return Err(BinderError::InvalidConfig(
                "worker poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RANGEBINDER_RANGE_RATIO` (default: 4.0)
    /// - `RANGEBINDER_WORKER_THREADS` (default: available cores, at most 4)
    /// - `RANGEBINDER_POLL_INTERVAL_MS` (default: 50)
    /// - `RANGEBINDER_DYNAMIC_CROSS_AXIS` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RANGEBINDER_RANGE_RATIO") {
            config.range_ratio = parse_value("RANGEBINDER_RANGE_RATIO", &val)?;
        }
        if let Ok(val) = std::env::var("RANGEBINDER_WORKER_THREADS") {
            config.worker_threads = parse_value("RANGEBINDER_WORKER_THREADS", &val)?;
        }
        if let Ok(val) = std::env::var("RANGEBINDER_POLL_INTERVAL_MS") {
            config.worker_poll_interval =
                Duration::from_millis(parse_value("RANGEBINDER_POLL_INTERVAL_MS", &val)?);
        }
        if let Ok(val) = std::env::var("RANGEBINDER_DYNAMIC_CROSS_AXIS") {
            config.dynamic_cross_axis = parse_value("RANGEBINDER_DYNAMIC_CROSS_AXIS", &val)?;
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// range_ratio = 4.0
    /// worker_threads = 2
    /// poll_interval_ms = 50
    /// dynamic_cross_axis = false
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "range_ratio" => config.range_ratio = parse_value(key, value)?,
                    "worker_threads" => config.worker_threads = parse_value(key, value)?,
                    "poll_interval_ms" => {
                        config.worker_poll_interval = Duration::from_millis(parse_value(key, value)?)
                    }
                    "dynamic_cross_axis" => config.dynamic_cross_axis = parse_value(key, value)?,
                    _ => {} // Ignore unknown keys
                }
            }
        }

        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml())?;
        Ok(())
    }

    fn to_toml(&self) -> String {
        format!(
            "# rangebinder configuration\n\
             range_ratio = {:?}\n\
             worker_threads = {}\n\
             poll_interval_ms = {}\n\
             dynamic_cross_axis = {}\n",
            self.range_ratio,
            self.worker_threads,
            self.worker_poll_interval.as_millis(),
            self.dynamic_cross_axis
        )
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn default_worker_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
