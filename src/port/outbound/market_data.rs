//! Market data port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::id::Symbol;
use crate::domain::price::PriceSeries;
use crate::error::Result;

/// Historical price source used by the evaluator.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Price samples for `symbol` between `since` and `until`.
    ///
    /// Fails with `DataError::Unavailable` when the provider cannot serve
    /// the request.
    async fn price_series(
        &self,
        symbol: &Symbol,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PriceSeries>;

    /// Provider name for logging.
    fn provider_name(&self) -> &'static str;
}
