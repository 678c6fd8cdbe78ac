//! CoinGecko REST client.
//!
//! `market_chart/range` returns 5-minute points for ranges up to one day
//! and hourly points beyond that. Longer windows are therefore fetched in
//! day-sized chunks and stitched together so evaluation keeps 5-minute
//! resolution.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::dto::MarketChartResponse;
use super::settings::CoinGeckoConfig;
use crate::domain::id::Symbol;
use crate::domain::price::{PriceSample, PriceSeries};
use crate::error::{DataError, Result};
use crate::port::outbound::market_data::MarketData;

/// Longest range requested in one call.
const CHUNK: chrono::Duration = chrono::Duration::hours(23);

/// HTTP client for CoinGecko price history.
pub struct CoinGeckoClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    vs_currency: String,
    coins: BTreeMap<String, String>,
    retry_max_attempts: u32,
    retry_backoff_ms: u64,
}

impl CoinGeckoClient {
    #[must_use]
    pub fn from_config(config: &CoinGeckoConfig) -> Self {
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            vs_currency: config.vs_currency.clone(),
            coins: config
                .coins
                .iter()
                .map(|(symbol, id)| (symbol.to_uppercase(), id.clone()))
                .collect(),
            retry_max_attempts: config.retry_max_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Provider coin id for `symbol`.
    ///
    /// # Errors
    ///
    /// [`DataError::Unavailable`] when the symbol is not mapped.
    pub fn coin_id(&self, symbol: &Symbol) -> Result<&str> {
        self.coins
            .get(symbol.as_str())
            .map(String::as_str)
            .ok_or_else(|| {
                DataError::Unavailable {
                    symbol: symbol.to_string(),
                    reason: "no CoinGecko coin id configured".into(),
                }
                .into()
            })
    }

    fn range_url(&self, coin_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> String {
        format!(
            "{}/coins/{}/market_chart/range?vs_currency={}&from={}&to={}",
            self.base_url,
            coin_id,
            self.vs_currency,
            from.timestamp(),
            to.timestamp()
        )
    }

    async fn fetch_range(
        &self,
        symbol: &Symbol,
        coin_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceSample>> {
        let url = self.range_url(coin_id, from, to);
        let unavailable = |reason: String| DataError::Unavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let mut attempt = 0;
        let max_attempts = self.retry_max_attempts.max(1);
        loop {
            attempt += 1;
            let mut request = self.http.get(&url);
            if let Some(key) = &self.api_key {
                request = request.header("x-cg-demo-api-key", key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    if attempt >= max_attempts || !(err.is_timeout() || err.is_connect()) {
                        return Err(unavailable(err.to_string()).into());
                    }
                    warn!(attempt, max_attempts, error = %err, "CoinGecko request failed, retrying");
                    if self.retry_backoff_ms > 0 {
                        sleep(Duration::from_millis(self.retry_backoff_ms)).await;
                    }
                    continue;
                }
            };

            let response = response
                .error_for_status()
                .map_err(|err| unavailable(err.to_string()))?;
            let body: MarketChartResponse = response
                .json()
                .await
                .map_err(|err| unavailable(format!("malformed response: {err}")))?;
            return Ok(body.samples());
        }
    }
}

/// Split `[since, until]` into consecutive ranges no longer than [`CHUNK`].
fn chunks(since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut ranges = Vec::new();
    let mut start = since;
    while start < until {
        let end = (start + CHUNK).min(until);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Sort by time and keep the first sample per timestamp.
fn stitch(mut samples: Vec<PriceSample>) -> PriceSeries {
    samples.sort_by_key(|s| s.at);
    samples.dedup_by_key(|s| s.at);
    PriceSeries::new(samples)
}

#[async_trait]
impl MarketData for CoinGeckoClient {
    async fn price_series(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let coin_id = self.coin_id(symbol)?;

        let mut samples = Vec::new();
        for (from, to) in chunks(since, until) {
            samples.extend(self.fetch_range(symbol, coin_id, from, to).await?);
        }
        samples.retain(|s| s.at >= since && s.at <= until);

        debug!(
            symbol = %symbol,
            coin = coin_id,
            samples = samples.len(),
            "Fetched price series"
        );
        Ok(stitch(samples))
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0).unwrap()
    }

    fn client() -> CoinGeckoClient {
        CoinGeckoClient::from_config(&CoinGeckoConfig::default())
    }

    #[test]
    fn chunks_cover_range_without_gaps() {
        let until = t0() + chrono::Duration::hours(50);
        let ranges = chunks(t0(), until);

        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].0, t0());
        assert_eq!(ranges[2].1, until);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert!(ranges.iter().all(|(a, b)| *b - *a <= CHUNK));
    }

    #[test]
    fn empty_range_has_no_chunks() {
        assert!(chunks(t0(), t0()).is_empty());
    }

    #[test]
    fn stitch_orders_and_dedups() {
        let series = stitch(vec![
            PriceSample::new(t0() + chrono::Duration::minutes(5), dec!(2)),
            PriceSample::new(t0(), dec!(1)),
            PriceSample::new(t0() + chrono::Duration::minutes(5), dec!(3)),
        ]);
        assert_eq!(series.len(), 2);
        assert!(series.is_monotonic());
        assert_eq!(series.last().unwrap().price, dec!(2));
    }

    #[test]
    fn coin_ids_are_case_insensitive_on_symbol() {
        let client = client();
        assert_eq!(client.coin_id(&Symbol::new("btc")).unwrap(), "bitcoin");
    }

    #[test]
    fn unmapped_symbol_is_unavailable() {
        let err = client().coin_id(&Symbol::new("NOPE")).unwrap_err();
        assert!(matches!(err, Error::Data(DataError::Unavailable { .. })));
    }

    #[test]
    fn range_url_uses_unix_seconds() {
        let url = client().range_url("bitcoin", t0(), t0() + chrono::Duration::hours(1));
        assert_eq!(
            url,
            "https://api.coingecko.com/api/v3/coins/bitcoin/market_chart/range?vs_currency=usd&from=1747036800&to=1747040400"
        );
    }
}
