//! CoinGecko response types.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::price::PriceSample;

/// Body of `/coins/{id}/market_chart/range`.
///
/// Each point is `[unix_millis, value]`. Only prices are used.
#[derive(Debug, Deserialize)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<[f64; 2]>,
}

impl MarketChartResponse {
    /// Convert to samples, dropping points that are not finite or not
    /// representable.
    #[must_use]
    pub fn samples(&self) -> Vec<PriceSample> {
        self.prices
            .iter()
            .filter_map(|[millis, price]| {
                if !millis.is_finite() || !price.is_finite() || *price <= 0.0 {
                    return None;
                }
                #[allow(clippy::cast_possible_truncation)]
                let at = DateTime::<Utc>::from_timestamp_millis(*millis as i64)?;
                let price = Decimal::from_f64(*price)?.normalize();
                Some(PriceSample::new(at, price))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_price_points() {
        let body = r#"{
            "prices": [[1747036800000, 104250.5], [1747037100000, 104310.25]],
            "market_caps": [[1747036800000, 2.0e12]],
            "total_volumes": []
        }"#;
        let response: MarketChartResponse = serde_json::from_str(body).unwrap();
        let samples = response.samples();

        assert_eq!(samples.len(), 2);
        assert_eq!(
            samples[0].at,
            Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0).unwrap()
        );
        assert_eq!(samples[0].price, dec!(104250.5));
        assert_eq!(samples[1].price, dec!(104310.25));
    }

    #[test]
    fn skips_non_positive_prices() {
        let body = r#"{"prices": [[1747036800000, 0.0], [1747037100000, 12.5]]}"#;
        let response: MarketChartResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.samples().len(), 1);
    }

    #[test]
    fn missing_prices_is_empty() {
        let response: MarketChartResponse = serde_json::from_str("{}").unwrap();
        assert!(response.samples().is_empty());
    }
}
