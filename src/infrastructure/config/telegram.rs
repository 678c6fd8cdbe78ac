//! Telegram notification configuration.

use serde::Deserialize;

const fn default_true() -> bool {
    true
}

/// Telegram notification configuration.
///
/// Credentials come from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Enable telegram notifications.
    #[serde(default)]
    pub enabled: bool,
    /// Send one message per validated prediction (can be noisy).
    #[serde(default)]
    pub notify_validations: bool,
    /// Send new insight summaries.
    #[serde(default = "default_true")]
    pub notify_insights: bool,
    /// Send degraded-run alerts.
    #[serde(default = "default_true")]
    pub notify_degraded: bool,
    #[serde(skip)]
    pub bot_token: Option<String>,
    #[serde(skip)]
    pub chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            notify_validations: false,
            notify_insights: default_true(),
            notify_degraded: default_true(),
            bot_token: None,
            chat_id: None,
        }
    }
}
