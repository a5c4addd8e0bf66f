// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is valid;
//! unknown keys are rejected to catch typos.

use rota_core::Platform;
use rota_storage::{Store, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of stored schedules
    pub schedule_limit: usize,
    /// How often due timers are polled
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    pub store_path: PathBuf,
    /// WAL entries appended before the store is compacted on a tick
    pub compact_threshold: u64,
    pub retry: RetryConfig,
    pub deferred: DeferredConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule_limit: 1000,
            tick_interval: Duration::from_secs(1),
            store_path: default_store_path(),
            compact_threshold: 1000,
            retry: RetryConfig::default(),
            deferred: DeferredConfig::default(),
        }
    }
}

/// Backoff for transient deferred-request failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts before giving up, including the first
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(120),
            multiplier: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeferredConfig {
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Platform reported in deferred requests
    pub platform: Platform,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            platform: Platform::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rota")
        .join("automation.wal")
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Open the schedule store at `store_path`, creating its directory
    pub fn open_store(&self) -> Result<Store, StoreError> {
        Store::open(&self.store_path)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "schedule_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "tick_interval",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.compact_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "compact_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.max_backoff < self.retry.initial_backoff {
            return Err(ConfigError::Invalid {
                field: "retry.max_backoff",
                reason: "must not be below retry.initial_backoff".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
