//! Persistence configuration: primary database, fallback file, retries.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::application::persistence::RetryPolicy;

/// Where records live.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path or URL. Overridden by `DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// How long the startup probe waits for a connection.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// JSON document used when the database is unreachable at startup.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: PathBuf,
}

fn default_database_url() -> String {
    "hindsight.db".into()
}

const fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_fallback_path() -> PathBuf {
    PathBuf::from("hindsight-fallback.json")
}

impl StoreConfig {
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            probe_timeout_ms: default_probe_timeout_ms(),
            fallback_path: default_fallback_path(),
        }
    }
}

/// Write retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}
