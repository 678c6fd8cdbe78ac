//! Price samples fetched from market data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single observed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

impl PriceSample {
    #[must_use]
    pub const fn new(at: DateTime<Utc>, price: Decimal) -> Self {
        Self { at, price }
    }
}

/// Price samples as returned by a provider.
///
/// No ordering is enforced on construction; [`is_monotonic`](Self::is_monotonic)
/// lets the evaluator reject out-of-order data instead of silently sorting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSeries {
    samples: Vec<PriceSample>,
}

impl PriceSeries {
    #[must_use]
    pub const fn new(samples: Vec<PriceSample>) -> Self {
        Self { samples }
    }

    #[must_use]
    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&PriceSample> {
        self.samples.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&PriceSample> {
        self.samples.last()
    }

    /// True when timestamps never decrease.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.samples.windows(2).all(|w| w[0].at <= w[1].at)
    }
}

impl From<Vec<PriceSample>> for PriceSeries {
    fn from(samples: Vec<PriceSample>) -> Self {
        Self::new(samples)
    }
}
