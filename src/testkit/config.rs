//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::path::Path;
use std::time::Duration;

use crate::application::persistence::RetryPolicy;
use crate::infrastructure::config::settings::Config;

/// Retry policy with millisecond delays, no waiting in tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
        multiplier: 2.0,
    }
}

/// Config whose database, fallback file and snapshot all live in `dir`.
///
/// Telegram stays disabled and retries are fast.
pub fn in_dir(dir: &Path) -> Config {
    let mut config = Config::default();
    config.store.database_url = dir.join("hindsight.db").display().to_string();
    config.store.fallback_path = dir.join("fallback.json");
    config.store.probe_timeout_ms = 500;
    config.retry.initial_delay_ms = 1;
    config.snapshot_dir = Some(dir.to_path_buf());
    config
}
