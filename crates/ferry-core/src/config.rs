//! Configuration surface consumed by the uploader.
//!
//! Defaults come from [`UploadConfig::default`]; `from_env` overrides them
//! with `FERRY_*` variables. [`UploadConfig::validate`] runs when the
//! uploader is built, so a bad chunk size stops the process at startup.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::app::planner;
use crate::app::retry::RetryPolicy;

const MIB: u64 = 1024 * 1024;

const DEFAULT_CHUNK_SIZE_BYTES: u64 = 8 * MIB;
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 2048 * MIB;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
const DEFAULT_CREDENTIAL_SAFETY_MARGIN_SEC: i64 = 300;
const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_SESSION_REOPENS: u32 = 3;
const DEFAULT_PROGRESS_QUEUE_CAPACITY: usize = 64;
const DEFAULT_PROGRESS_SINK_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk size {0} is not a positive multiple of 256 KiB")]
    ChunkSizeNotAligned(u64),

    #[error("{key} must be positive")]
    NotPositive { key: &'static str },

    #[error("retry multiplier must be >= 1.0, got {0}")]
    Multiplier(f64),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub chunk_size_bytes: u64,
    pub max_file_size_bytes: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,
    pub credential_safety_margin_sec: i64,
    pub chunk_timeout_secs: u64,
    pub max_session_reopens: u32,
    pub progress_queue_capacity: usize,
    pub progress_sink_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_multiplier: DEFAULT_RETRY_MULTIPLIER,
            credential_safety_margin_sec: DEFAULT_CREDENTIAL_SAFETY_MARGIN_SEC,
            chunk_timeout_secs: DEFAULT_CHUNK_TIMEOUT_SECS,
            max_session_reopens: DEFAULT_MAX_SESSION_REOPENS,
            progress_queue_capacity: DEFAULT_PROGRESS_QUEUE_CAPACITY,
            progress_sink_timeout_ms: DEFAULT_PROGRESS_SINK_TIMEOUT_MS,
        }
    }
}

impl UploadConfig {
    /// Defaults overridden by `FERRY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`UploadConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        override_with(&lookup, "FERRY_CHUNK_SIZE_BYTES", &mut config.chunk_size_bytes)?;
        override_with(&lookup, "FERRY_MAX_FILE_SIZE_BYTES", &mut config.max_file_size_bytes)?;
        override_with(&lookup, "FERRY_RETRY_MAX_ATTEMPTS", &mut config.retry_max_attempts)?;
        override_with(&lookup, "FERRY_RETRY_BASE_DELAY_MS", &mut config.retry_base_delay_ms)?;
        override_with(&lookup, "FERRY_RETRY_MULTIPLIER", &mut config.retry_multiplier)?;
        override_with(
            &lookup,
            "FERRY_CREDENTIAL_SAFETY_MARGIN_SEC",
            &mut config.credential_safety_margin_sec,
        )?;
        override_with(&lookup, "FERRY_CHUNK_TIMEOUT_SECS", &mut config.chunk_timeout_secs)?;
        override_with(&lookup, "FERRY_MAX_SESSION_REOPENS", &mut config.max_session_reopens)?;
        override_with(
            &lookup,
            "FERRY_PROGRESS_QUEUE_CAPACITY",
            &mut config.progress_queue_capacity,
        )?;
        override_with(
            &lookup,
            "FERRY_PROGRESS_SINK_TIMEOUT_MS",
            &mut config.progress_sink_timeout_ms,
        )?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !planner::is_aligned_chunk_size(self.chunk_size_bytes) {
            return Err(ConfigError::ChunkSizeNotAligned(self.chunk_size_bytes));
        }
        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::NotPositive { key: "max_file_size_bytes" });
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::NotPositive { key: "retry_max_attempts" });
        }
        if self.retry_multiplier < 1.0 || !self.retry_multiplier.is_finite() {
            return Err(ConfigError::Multiplier(self.retry_multiplier));
        }
        if self.credential_safety_margin_sec < 0 {
            return Err(ConfigError::NotPositive { key: "credential_safety_margin_sec" });
        }
        if self.chunk_timeout_secs == 0 {
            return Err(ConfigError::NotPositive { key: "chunk_timeout_secs" });
        }
        if self.progress_queue_capacity == 0 {
            return Err(ConfigError::NotPositive { key: "progress_queue_capacity" });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            multiplier: self.retry_multiplier,
            max_attempts: self.retry_max_attempts,
        }
    }

    pub fn safety_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.credential_safety_margin_sec)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn progress_sink_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_sink_timeout_ms)
    }
}

fn override_with<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw.clone() })?;
    }
    Ok(())
}
