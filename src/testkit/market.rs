//! Scripted market data for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::id::Symbol;
use crate::domain::price::PriceSeries;
use crate::error::{DataError, Result};
use crate::port::outbound::market_data::MarketData;

/// Serves pre-loaded series, clipped to the requested window.
///
/// Symbols without a script fail with [`DataError::Unavailable`].
#[derive(Default)]
pub struct ScriptedMarketData {
    series: Mutex<HashMap<Symbol, PriceSeries>>,
    requests: AtomicU32,
}

impl ScriptedMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `series` for `symbol`.
    pub fn with_series(self, symbol: &str, series: PriceSeries) -> Self {
        self.set_series(symbol, series);
        self
    }

    /// Replace the script for `symbol`.
    pub fn set_series(&self, symbol: &str, series: PriceSeries) {
        self.series.lock().insert(Symbol::new(symbol), series);
    }

    /// Number of `price_series` calls served or failed.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for ScriptedMarketData {
    async fn price_series(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let scripts = self.series.lock();
        let series = scripts.get(symbol).ok_or_else(|| DataError::Unavailable {
            symbol: symbol.to_string(),
            reason: "no scripted series".into(),
        })?;
        Ok(PriceSeries::new(
            series
                .samples()
                .iter()
                .filter(|s| s.at >= since && s.at <= until)
                .cloned()
                .collect(),
        ))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
