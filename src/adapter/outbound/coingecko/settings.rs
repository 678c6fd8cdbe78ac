//! CoinGecko provider configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// CoinGecko settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `x-cg-demo-api-key`. Overridden by `COINGECKO_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Quote currency for prices.
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    /// Ticker symbol to provider coin id, e.g. `BTC = "bitcoin"`.
    #[serde(default = "default_coins")]
    pub coins: BTreeMap<String, String>,
    /// Attempts per request for timeouts and connection failures.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

const fn default_retry_max_attempts() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_base_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_vs_currency() -> String {
    "usd".into()
}

fn default_coins() -> BTreeMap<String, String> {
    [
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("SOL", "solana"),
        ("BNB", "binancecoin"),
        ("XRP", "ripple"),
    ]
    .into_iter()
    .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
    .collect()
}

impl CoinGeckoConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            vs_currency: default_vs_currency(),
            coins: default_coins(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
