//! Builders for domain primitives used across tests.
//!
//! Provides concise factory functions for predictions, outcomes, price
//! series and insight records so tests focus on assertions rather than
//! construction boilerplate.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::id::Symbol;
use crate::domain::insight::{Evidence, InsightRecord, ParameterSet};
use crate::domain::period::PeriodId;
use crate::domain::prediction::{
    Direction, MarketSnapshot, Mode, Outcome, Prediction, SentimentRegime, Targets, Verdict,
    VolatilityRegime,
};
use crate::domain::price::{PriceSample, PriceSeries};

/// Monday 2025-05-12 08:00 UTC, inside ISO week 2025-W20.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0).unwrap()
}

/// A neutral BTC snapshot at price 100.
pub fn snapshot() -> MarketSnapshot {
    snapshot_for("BTC")
}

pub fn snapshot_for(symbol: &str) -> MarketSnapshot {
    MarketSnapshot {
        symbol: Symbol::new(symbol),
        reference_price: dec!(100),
        volatility: VolatilityRegime::Normal,
        sentiment: SentimentRegime::Neutral,
    }
}

/// Long from 100, take-profit 110, stop 95: a 2R target.
pub fn long_targets() -> Targets {
    Targets::try_new(Direction::Long, dec!(100), vec![dec!(110)], dec!(95)).unwrap()
}

/// Short from 100, take-profit 90, stop 105.
pub fn short_targets() -> Targets {
    Targets::try_new(Direction::Short, dec!(100), vec![dec!(90)], dec!(105)).unwrap()
}

/// Pending live prediction with explicit tags and confidence.
pub fn prediction_with(
    created_at: DateTime<Utc>,
    setup_tags: &[&str],
    confidence: f64,
) -> Prediction {
    Prediction::try_new(
        Mode::Live,
        snapshot(),
        long_targets(),
        confidence,
        setup_tags.iter().map(|t| (*t).to_string()).collect(),
        created_at,
    )
    .unwrap()
}

/// Pending long prediction created at `created_at`.
pub fn pending_at(created_at: DateTime<Utc>) -> Prediction {
    prediction_with(created_at, &["momentum"], 0.7)
}

/// Pending long prediction created at [`t0`].
pub fn pending_prediction() -> Prediction {
    pending_at(t0())
}

/// An outcome with the given verdict and R, validated at `validated_at`.
pub fn outcome(verdict: Verdict, realized_r: f64, validated_at: DateTime<Utc>) -> Outcome {
    let exit_price = match verdict {
        Verdict::Win => dec!(110),
        Verdict::Loss => dec!(95),
        Verdict::Expired => dec!(103),
    };
    Outcome {
        verdict,
        exit_price,
        exit_at: validated_at,
        realized_r,
        target_hit: (verdict == Verdict::Win).then_some(0),
        validated_at,
    }
}

/// A 2R win validated two hours after [`t0`].
pub fn win_outcome() -> Outcome {
    outcome(Verdict::Win, 2.0, t0() + Duration::hours(2))
}

/// A finalized prediction with explicit tags, confidence and result.
pub fn terminal_with(
    created_at: DateTime<Utc>,
    setup_tags: &[&str],
    confidence: f64,
    verdict: Verdict,
    realized_r: f64,
    validated_at: DateTime<Utc>,
) -> Prediction {
    let mut prediction = prediction_with(created_at, setup_tags, confidence);
    prediction
        .finalize(outcome(verdict, realized_r, validated_at))
        .unwrap();
    prediction
}

/// A 2R win created at `created_at` and validated at `validated_at`.
pub fn terminal_at(created_at: DateTime<Utc>, validated_at: DateTime<Utc>) -> Prediction {
    terminal_with(
        created_at,
        &["momentum"],
        0.7,
        Verdict::Win,
        2.0,
        validated_at,
    )
}

/// Price series from `(minutes after start, price)` pairs.
pub fn prices(start: DateTime<Utc>, points: &[(i64, Decimal)]) -> PriceSeries {
    PriceSeries::new(
        points
            .iter()
            .map(|(mins, price)| PriceSample::new(start + Duration::minutes(*mins), *price))
            .collect(),
    )
}

/// An empty insight record for `period` (e.g. `"2025-W20"`).
pub fn insight(period: &str, version: u64) -> InsightRecord {
    let period: PeriodId = period.parse().unwrap();
    InsightRecord {
        period,
        version,
        generated_at: period.end(),
        best_setups: Vec::new(),
        worst_setups: Vec::new(),
        best_times: Vec::new(),
        worst_times: Vec::new(),
        deltas: BTreeMap::new(),
        setup_flags: BTreeMap::new(),
        calibration_warnings: Vec::new(),
        evidence: Evidence::default(),
        parameters: ParameterSet::default(),
    }
}
