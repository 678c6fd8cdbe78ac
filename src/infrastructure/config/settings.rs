//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file with environment variable
//! overrides for deployment-specific and secret values.
//!
//! # Example
//!
//! ```no_run
//! use hindsight::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::engine::{AggregationConfig, EvaluationConfig, ScheduleConfig, SynthesisConfig};
use super::logging::LoggingConfig;
use super::store::{RetryConfig, StoreConfig};
use super::telegram::TelegramConfig;
use crate::adapter::outbound::coingecko::settings::CoinGeckoConfig;
use crate::domain::prediction::Mode;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Every section is optional; an empty file yields a working setup that
/// stores records in `hindsight.db` in the current directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Mode stamped on predictions accepted by this process.
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Primary database and fallback file.
    #[serde(default)]
    pub store: StoreConfig,

    /// Write retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Historical price provider.
    #[serde(default)]
    pub market_data: CoinGeckoConfig,

    /// Telegram notification configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Directory for the learning snapshot file. Disabled when unset.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

const fn default_mode() -> Mode {
    Mode::Live
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
            retry: RetryConfig::default(),
            evaluation: EvaluationConfig::default(),
            aggregation: AggregationConfig::default(),
            synthesis: SynthesisConfig::default(),
            schedule: ScheduleConfig::default(),
            market_data: CoinGeckoConfig::default(),
            telegram: TelegramConfig::default(),
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Applies overrides from the process environment, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Override file values from environment lookups.
    ///
    /// Recognized: `DATABASE_URL`, `HINDSIGHT_MODE`, `COINGECKO_API_KEY`,
    /// `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is set to an unusable value.
    #[allow(clippy::result_large_err)]
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.store.database_url = url;
        }
        if let Some(mode) = lookup("HINDSIGHT_MODE") {
            self.mode = match mode.trim().to_ascii_lowercase().as_str() {
                "live" => Mode::Live,
                "rehearsal" => Mode::Rehearsal,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "HINDSIGHT_MODE",
                        reason: format!("unknown mode '{other}'"),
                    }
                    .into())
                }
            };
        }
        if let Some(key) = lookup("COINGECKO_API_KEY").filter(|v| !v.is_empty()) {
            self.market_data.api_key = Some(key);
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()) {
            let chat_id = chat.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "TELEGRAM_CHAT_ID",
                reason: format!("'{chat}' is not a numeric chat id"),
            })?;
            self.telegram.chat_id = Some(chat_id);
        }
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first field found out of range.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if !LoggingConfig::FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("must be one of {}", LoggingConfig::FORMATS.join(", ")),
            }
            .into());
        }
        if self.store.database_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "store.database_url",
            }
            .into());
        }
        if self.store.probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.probe_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if self.evaluation.max_holding_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.max_holding_hours",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.evaluation.coverage_tolerance_secs < 0 {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.coverage_tolerance_secs",
                reason: "must be 0 or greater".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.aggregation.calibration_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "aggregation.calibration_threshold",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }
        if self.aggregation.groupings.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "aggregation.groupings",
                reason: "must name at least one dimension".to_string(),
            }
            .into());
        }

        let policy = self.synthesis.policy();
        if policy.min_evidence == 0 {
            return Err(ConfigError::InvalidValue {
                field: "synthesis.min_evidence",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if !(0.0..=0.05).contains(&policy.max_weight_step) {
            return Err(ConfigError::InvalidValue {
                field: "synthesis.max_weight_step",
                reason: "must be between 0 and 0.05".to_string(),
            }
            .into());
        }
        if !(0.0..=0.1).contains(&policy.max_confidence_step) {
            return Err(ConfigError::InvalidValue {
                field: "synthesis.max_confidence_step",
                reason: "must be between 0 and 0.1".to_string(),
            }
            .into());
        }
        if policy.base_weights.values().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(ConfigError::InvalidValue {
                field: "synthesis.base_weights",
                reason: "weights must be between 0 and 1".to_string(),
            }
            .into());
        }

        if self.schedule.tick_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule.tick_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.market_data.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "market_data.timeout_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.telegram.enabled
            && (self.telegram.bot_token.is_none() || self.telegram.chat_id.is_none())
        {
            return Err(ConfigError::MissingField {
                field: "TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID",
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
