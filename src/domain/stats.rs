//! Aggregate bucket statistics.
//!
//! Every terminal prediction lands in exactly one bucket per [`Dimension`].
//! Buckets are always recomputed from the full terminal set of a period, so
//! the numbers here are never updated incrementally across runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::prediction::Verdict;

/// A grouping dimension for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Setup,
    HourOfDay,
    DayOfWeek,
    Volatility,
    Sentiment,
    Confidence,
    Direction,
    Symbol,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Self; 8] = [
        Self::Setup,
        Self::HourOfDay,
        Self::DayOfWeek,
        Self::Volatility,
        Self::Sentiment,
        Self::Confidence,
        Self::Direction,
        Self::Symbol,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::HourOfDay => "hour_of_day",
            Self::DayOfWeek => "day_of_week",
            Self::Volatility => "volatility",
            Self::Sentiment => "sentiment",
            Self::Confidence => "confidence",
            Self::Direction => "direction",
            Self::Symbol => "symbol",
        }
    }

    /// Time buckets are ranked together by the synthesizer.
    #[must_use]
    pub const fn is_time(self) -> bool {
        matches!(self, Self::HourOfDay | Self::DayOfWeek)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension '{s}'"))
    }
}

/// Counters and R sums for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub expired: u32,
    pub sum_r: f64,
    pub gross_profit_r: f64,
    pub gross_loss_r: f64,
}

impl BucketStats {
    /// Fold one terminal outcome into the bucket.
    pub fn record(&mut self, verdict: Verdict, r: f64) {
        self.trades += 1;
        match verdict {
            Verdict::Win => self.wins += 1,
            Verdict::Loss => self.losses += 1,
            Verdict::Expired => self.expired += 1,
        }
        self.sum_r += r;
        if r > 0.0 {
            self.gross_profit_r += r;
        } else if r < 0.0 {
            self.gross_loss_r += r;
        }
    }

    /// Wins over all trades, expired ones included.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(self.trades)
    }

    #[must_use]
    pub fn average_r(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.sum_r / f64::from(self.trades)
    }

    /// Gross positive R over absolute gross negative R.
    ///
    /// Returns `None` when the bucket has no negative R at all.
    #[must_use]
    pub fn profit_factor(&self) -> Option<f64> {
        if self.gross_loss_r < 0.0 {
            Some(self.gross_profit_r / self.gross_loss_r.abs())
        } else {
            None
        }
    }
}

/// Predicted versus realized win rate for a confidence bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Bucket midpoint, e.g. `0.75` for `"70-80"`.
    pub predicted: f64,
    pub actual: f64,
    /// `actual - predicted`.
    pub gap: f64,
    pub warning: bool,
}

impl Calibration {
    #[must_use]
    pub fn new(predicted: f64, actual: f64, threshold: f64) -> Self {
        let gap = actual - predicted;
        Self {
            predicted,
            actual,
            gap,
            warning: gap.abs() > threshold,
        }
    }
}

/// Statistics for one `(dimension, value)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub dimension: Dimension,
    pub value: String,
    pub stats: BucketStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
}

impl AggregateBucket {
    /// `dimension:value`, used as the final ranking tie-break.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.dimension, self.value)
    }
}

/// Decile label for a confidence score, `"70-80"` for `0.72`.
///
/// A confidence of exactly `1.0` falls in `"90-100"`.
#[must_use]
pub fn confidence_bucket(confidence: f64) -> String {
    let decile = ((confidence * 10.0).floor() as u32).min(9);
    format!("{}-{}", decile * 10, decile * 10 + 10)
}

/// Midpoint of a confidence bucket label as a probability.
#[must_use]
pub fn confidence_midpoint(label: &str) -> Option<f64> {
    let (lo, hi) = label.split_once('-')?;
    let lo: f64 = lo.parse().ok()?;
    let hi: f64 = hi.parse().ok()?;
    Some((lo + hi) / 200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_gross_sides() {
        let mut stats = BucketStats::default();
        stats.record(Verdict::Win, 2.0);
        stats.record(Verdict::Loss, -1.0);
        stats.record(Verdict::Expired, 0.6);

        assert_eq!(stats.trades, 3);
        assert_eq!((stats.wins, stats.losses, stats.expired), (1, 1, 1));
        assert!((stats.sum_r - 1.6).abs() < 1e-12);
        assert!((stats.gross_profit_r - 2.6).abs() < 1e-12);
        assert!((stats.gross_loss_r + 1.0).abs() < 1e-12);
        assert!((stats.profit_factor().unwrap() - 2.6).abs() < 1e-12);
        assert!((stats.win_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_undefined_without_losses() {
        let mut stats = BucketStats::default();
        stats.record(Verdict::Win, 1.0);
        stats.record(Verdict::Expired, 0.0);
        assert_eq!(stats.profit_factor(), None);
    }

    #[test]
    fn confidence_deciles() {
        assert_eq!(confidence_bucket(0.72), "70-80");
        assert_eq!(confidence_bucket(0.0), "0-10");
        assert_eq!(confidence_bucket(1.0), "90-100");
        assert_eq!(confidence_midpoint("70-80"), Some(0.75));
    }

    #[test]
    fn calibration_warns_past_threshold() {
        assert!(Calibration::new(0.75, 0.55, 0.15).warning);
        assert!(!Calibration::new(0.75, 0.65, 0.15).warning);
    }

    #[test]
    fn dimension_names_round_trip() {
        for dimension in Dimension::ALL {
            assert_eq!(dimension.as_str().parse::<Dimension>(), Ok(dimension));
        }
    }
}
