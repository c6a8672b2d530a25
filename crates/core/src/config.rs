// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration
//!
//! All tunables load from a TOML file; every key is optional and falls
//! back to its default, so a partial (or absent) file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunable server parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Network bind address for the request listener
    pub listen_addr: String,

    /// Lease duration applied at poll time
    #[serde(with = "duration_secs")]
    pub visibility_timeout: Duration,

    /// Enqueue payloads larger than this are rejected
    pub max_payload_bytes: usize,

    /// Enqueue of new ids is rejected once this many tasks are resident
    pub max_tasks_in_memory: usize,

    /// On-disk location of the WAL
    pub wal_file_path: PathBuf,

    /// When true, every record is flushed to stable storage before the
    /// operation reports success
    pub wal_sync_on_write: bool,

    /// Cadence of the visibility scanner
    #[serde(with = "duration_secs")]
    pub visibility_scan_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            visibility_timeout: Duration::from_secs(30),
            max_payload_bytes: 64 * 1024,
            max_tasks_in_memory: 10_000,
            wal_file_path: PathBuf::from("dq.wal"),
            wal_sync_on_write: true,
            visibility_scan_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_toml(&content)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
