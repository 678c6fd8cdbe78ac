//! Performance aggregation over terminal predictions.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use tracing::debug;

use crate::domain::prediction::Prediction;
use crate::domain::stats::{
    confidence_bucket, confidence_midpoint, AggregateBucket, BucketStats, Calibration, Dimension,
};

/// Default calibration gap, as a fraction, above which a warning is set.
pub const DEFAULT_CALIBRATION_THRESHOLD: f64 = 0.15;

/// Rolls terminal predictions into per-dimension buckets.
///
/// Output depends only on the set of records passed in: they are sorted by
/// id before summation, so the f64 sums come out bit-identical whatever
/// order the store returned them in.
#[derive(Debug, Clone)]
pub struct PerformanceAggregator {
    calibration_threshold: f64,
}

impl Default for PerformanceAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_THRESHOLD)
    }
}

impl PerformanceAggregator {
    #[must_use]
    pub const fn new(calibration_threshold: f64) -> Self {
        Self {
            calibration_threshold,
        }
    }

    /// Aggregate records validated within `[start, end)` by `groupings`.
    ///
    /// Pending records and records validated outside the range are skipped.
    /// Buckets are ordered by the position of their dimension in
    /// `groupings`, then by value.
    #[must_use]
    pub fn aggregate(
        &self,
        records: &[Prediction],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        groupings: &[Dimension],
    ) -> Vec<AggregateBucket> {
        let mut dimensions: Vec<Dimension> = Vec::with_capacity(groupings.len());
        for dimension in groupings {
            if !dimensions.contains(dimension) {
                dimensions.push(*dimension);
            }
        }

        let mut selected: Vec<&Prediction> = records
            .iter()
            .filter(|p| {
                p.outcome()
                    .is_some_and(|o| o.validated_at >= start && o.validated_at < end)
            })
            .collect();
        selected.sort_by(|a, b| a.id.cmp(&b.id));

        let mut table: BTreeMap<(usize, String), BucketStats> = BTreeMap::new();
        for prediction in &selected {
            let Some(outcome) = prediction.outcome() else {
                continue;
            };
            for (index, dimension) in dimensions.iter().enumerate() {
                table
                    .entry((index, dimension_value(prediction, *dimension)))
                    .or_default()
                    .record(outcome.verdict, outcome.realized_r);
            }
        }

        debug!(
            records = selected.len(),
            buckets = table.len(),
            "Aggregated terminal predictions"
        );

        table
            .into_iter()
            .map(|((index, value), stats)| {
                let dimension = dimensions[index];
                let calibration = (dimension == Dimension::Confidence)
                    .then(|| confidence_midpoint(&value))
                    .flatten()
                    .map(|predicted| {
                        Calibration::new(predicted, stats.win_rate(), self.calibration_threshold)
                    });
                AggregateBucket {
                    dimension,
                    value,
                    stats,
                    calibration,
                }
            })
            .collect()
    }
}

/// The bucket value of `prediction` along `dimension`.
#[must_use]
pub fn dimension_value(prediction: &Prediction, dimension: Dimension) -> String {
    match dimension {
        Dimension::Setup => prediction.setup_key(),
        Dimension::HourOfDay => format!("{:02}", prediction.created_at.hour()),
        Dimension::DayOfWeek => weekday_name(prediction.created_at.weekday()).to_string(),
        Dimension::Volatility => prediction.snapshot.volatility.as_str().to_string(),
        Dimension::Sentiment => prediction.snapshot.sentiment.as_str().to_string(),
        Dimension::Confidence => confidence_bucket(prediction.confidence),
        Dimension::Direction => prediction.targets.direction().as_str().to_string(),
        Dimension::Symbol => prediction.snapshot.symbol.to_string(),
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{PredictionId, Symbol};
    use crate::domain::prediction::{
        Direction, MarketSnapshot, Mode, Outcome, SentimentRegime, Targets, Verdict,
        VolatilityRegime,
    };
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 8, 30, 0).unwrap()
    }

    fn terminal(id: &str, tags: &[&str], confidence: f64, verdict: Verdict, r: f64) -> Prediction {
        let mut prediction = Prediction::try_new(
            Mode::Live,
            MarketSnapshot {
                symbol: Symbol::new("BTC"),
                reference_price: dec!(100),
                volatility: VolatilityRegime::High,
                sentiment: SentimentRegime::Fear,
            },
            Targets::try_new(Direction::Long, dec!(100), vec![dec!(110)], dec!(95)).unwrap(),
            confidence,
            tags.iter().map(|t| (*t).to_string()).collect(),
            t0(),
        )
        .unwrap();
        prediction.id = PredictionId::from(id);
        prediction
            .finalize(Outcome {
                verdict,
                exit_price: dec!(100),
                exit_at: t0() + Duration::hours(1),
                realized_r: r,
                target_hit: None,
                validated_at: t0() + Duration::hours(2),
            })
            .unwrap();
        prediction
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (t0() - Duration::days(1), t0() + Duration::days(1))
    }

    #[test]
    fn every_record_lands_in_one_bucket_per_dimension() {
        let records = vec![
            terminal("a", &["momentum"], 0.72, Verdict::Win, 2.0),
            terminal("b", &["momentum", "volume_flow"], 0.55, Verdict::Loss, -1.0),
            terminal("c", &[], 0.78, Verdict::Expired, 0.6),
        ];
        let (start, end) = window();
        let buckets = PerformanceAggregator::default().aggregate(&records, start, end, &Dimension::ALL);

        for dimension in Dimension::ALL {
            let total: u32 = buckets
                .iter()
                .filter(|b| b.dimension == dimension)
                .map(|b| b.stats.trades)
                .sum();
            assert_eq!(total, 3, "{dimension}");
        }

        let setups: Vec<&str> = buckets
            .iter()
            .filter(|b| b.dimension == Dimension::Setup)
            .map(|b| b.value.as_str())
            .collect();
        assert_eq!(setups, vec!["momentum", "momentum+volume_flow", "untagged"]);

        let hour = buckets.iter().find(|b| b.dimension == Dimension::HourOfDay).unwrap();
        assert_eq!(hour.value, "08");
        let day = buckets.iter().find(|b| b.dimension == Dimension::DayOfWeek).unwrap();
        assert_eq!(day.value, "mon");
    }

    #[test]
    fn output_follows_requested_dimension_order() {
        let records = vec![terminal("a", &["x"], 0.5, Verdict::Win, 1.0)];
        let (start, end) = window();
        let buckets = PerformanceAggregator::default().aggregate(
            &records,
            start,
            end,
            &[Dimension::Symbol, Dimension::Setup, Dimension::Symbol],
        );
        let dims: Vec<Dimension> = buckets.iter().map(|b| b.dimension).collect();
        assert_eq!(dims, vec![Dimension::Symbol, Dimension::Setup]);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let records: Vec<Prediction> = (0..20)
            .map(|i| {
                let r = f64::from(i) * 0.1 - 0.7;
                let verdict = if r > 0.0 { Verdict::Win } else { Verdict::Loss };
                terminal(&format!("id-{i:02}"), &["momentum"], 0.61, verdict, r)
            })
            .collect();
        let mut reversed = records.clone();
        reversed.reverse();

        let (start, end) = window();
        let aggregator = PerformanceAggregator::default();
        let a = aggregator.aggregate(&records, start, end, &Dimension::ALL);
        let b = aggregator.aggregate(&reversed, start, end, &Dimension::ALL);

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn pending_and_out_of_range_records_are_skipped() {
        let mut pending = terminal("p", &["x"], 0.5, Verdict::Win, 1.0);
        pending = Prediction::try_new(
            pending.mode,
            pending.snapshot.clone(),
            pending.targets.clone(),
            0.5,
            vec![],
            t0(),
        )
        .unwrap();
        let records = vec![pending, terminal("a", &["x"], 0.5, Verdict::Win, 1.0)];

        let (start, end) = window();
        let buckets = PerformanceAggregator::default().aggregate(&records, start, end, &[Dimension::Setup]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].stats.trades, 1);

        let later = t0() + Duration::days(2);
        let none = PerformanceAggregator::default().aggregate(
            &records,
            later,
            later + Duration::days(1),
            &[Dimension::Setup],
        );
        assert!(none.is_empty());
    }

    #[test]
    fn confidence_buckets_carry_calibration() {
        let records = vec![
            terminal("a", &[], 0.72, Verdict::Loss, -1.0),
            terminal("b", &[], 0.75, Verdict::Loss, -1.0),
            terminal("c", &[], 0.71, Verdict::Win, 2.0),
        ];
        let (start, end) = window();
        let buckets = PerformanceAggregator::default().aggregate(&records, start, end, &[Dimension::Confidence]);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].value, "70-80");
        let calibration = buckets[0].calibration.as_ref().unwrap();
        assert!((calibration.predicted - 0.75).abs() < 1e-12);
        assert!((calibration.actual - 1.0 / 3.0).abs() < 1e-12);
        assert!(calibration.warning);
    }

    #[test]
    fn non_confidence_buckets_have_no_calibration() {
        let records = vec![terminal("a", &[], 0.72, Verdict::Win, 2.0)];
        let (start, end) = window();
        let buckets = PerformanceAggregator::default().aggregate(&records, start, end, &[Dimension::Setup]);
        assert!(buckets[0].calibration.is_none());
    }
}
