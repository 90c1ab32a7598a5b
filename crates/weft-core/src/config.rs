//! Queue configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DEFAULT_PRIORITY, DEFAULT_TTR_SECS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Idle-poll backoff settings for workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 50,
            multiplier: 2.0,
            max_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Reservations a job may use before an expired lease fails it.
    pub max_attempts: u32,

    pub default_priority: i32,

    /// Lease length for jobs pushed without an explicit ttr.
    pub default_ttr_secs: u32,

    /// Lookups `reserve_next` retries after losing a reservation race.
    pub reserve_retries: u32,

    /// Reclaim expired leases before every reservation.
    pub sweep_on_reserve: bool,

    pub poll: PollConfig,

    /// Period of the background reaper.
    pub reap_interval_ms: u64,

    /// Worker count for `WorkerGroup`s spawned from this config.
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_priority: DEFAULT_PRIORITY,
            default_ttr_secs: DEFAULT_TTR_SECS,
            reserve_retries: 3,
            sweep_on_reserve: true,
            poll: PollConfig::default(),
            reap_interval_ms: 1_000,
            workers: 1,
        }
    }
}

impl QueueConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        let config: QueueConfig = if yaml.trim().is_empty() {
            QueueConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.default_ttr_secs == 0 {
            return Err(ConfigError::Invalid("default_ttr_secs must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::Invalid("reap_interval_ms must be positive".into()));
        }
        if self.poll.base_delay_ms == 0 || self.poll.max_delay_ms < self.poll.base_delay_ms {
            return Err(ConfigError::Invalid(
                "poll delays must satisfy 0 < base_delay_ms <= max_delay_ms".into(),
            ));
        }
        if !(self.poll.multiplier >= 1.0) {
            return Err(ConfigError::Invalid("poll.multiplier must be >= 1.0".into()));
        }
        Ok(())
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}
