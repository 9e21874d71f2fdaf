//! Engine configuration
//!
//! JSON on disk, every field optional thanks to `#[serde(default)]`, with a
//! small set of environment overrides applied on top.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecConfig;
use crate::ingest::IngestConfig;
use crate::scheduler::PollConfig;
use crate::spatial::PickerConfig;

pub const ENV_SNAPSHOT_URL: &str = "ORBIS_SNAPSHOT_URL";
pub const ENV_DEGRADED_URL: &str = "ORBIS_DEGRADED_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "ORBIS_POLL_INTERVAL_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Snapshot endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Primary snapshot URL
    pub snapshot_url: String,

    /// Optional fallback used while the primary is unavailable
    pub degraded_url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot_url: "http://127.0.0.1:8080/api/v1/snapshot".to_string(),
            degraded_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbisConfig {
    pub source: SourceConfig,
    pub poll: PollConfig,
    pub ingest: IngestConfig,
    pub codec: CodecConfig,
    pub picker: PickerConfig,
}

impl OrbisConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_json_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply `ORBIS_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SNAPSHOT_URL) {
            self.source.snapshot_url = url;
        }
        if let Some(url) = lookup(ENV_DEGRADED_URL) {
            self.source.degraded_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll.interval_ms = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { key: ENV_POLL_INTERVAL_MS, value })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be positive".into()));
        }
        if self.poll.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("poll.request_timeout_ms must be positive".into()));
        }
        if !(self.picker.cell_size.is_finite() && self.picker.cell_size > 0.0) {
            return Err(ConfigError::Invalid("picker.cell_size must be positive".into()));
        }
        if !(self.picker.pick_radius.is_finite() && self.picker.pick_radius >= 0.0) {
            return Err(ConfigError::Invalid("picker.pick_radius must not be negative".into()));
        }
        if self.ingest.intensity_sample == 0 {
            return Err(ConfigError::Invalid("ingest.intensity_sample must be positive".into()));
        }
        if self.source.snapshot_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source.snapshot_url is empty".into()));
        }
        Ok(())
    }
}
