//! Outcome evaluation for pending predictions.
//!
//! The evaluator is a pure function of a prediction, a price series and the
//! evaluation time. It never touches storage; persisting the result is the
//! caller's job.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::prediction::{Direction, Outcome, Prediction, Verdict};
use crate::domain::price::{PriceSample, PriceSeries};
use crate::error::DataError;

/// Default holding window when a prediction has no override.
pub const DEFAULT_MAX_HOLDING_HOURS: u32 = 24;

/// Default allowed gap between creation and the first price sample.
pub const DEFAULT_COVERAGE_TOLERANCE_SECS: i64 = 300;

/// Result of evaluating one prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The prediction was already terminal; its outcome is returned as is.
    AlreadyFinal(Outcome),
    /// A verdict was reached now.
    Finalized(Outcome),
    /// Nothing crossed and the holding window is still open.
    Open,
}

impl Evaluation {
    /// The outcome that needs persisting, if any.
    #[must_use]
    pub const fn new_outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Finalized(outcome) => Some(outcome),
            Self::AlreadyFinal(_) | Self::Open => None,
        }
    }
}

/// Decides win, loss or expiry for pending predictions.
#[derive(Debug, Clone)]
pub struct OutcomeEvaluator {
    max_holding_hours: u32,
    coverage_tolerance: Duration,
}

impl Default for OutcomeEvaluator {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_HOLDING_HOURS,
            Duration::seconds(DEFAULT_COVERAGE_TOLERANCE_SECS),
        )
    }
}

impl OutcomeEvaluator {
    #[must_use]
    pub const fn new(max_holding_hours: u32, coverage_tolerance: Duration) -> Self {
        Self {
            max_holding_hours,
            coverage_tolerance,
        }
    }

    #[must_use]
    pub const fn max_holding_hours(&self) -> u32 {
        self.max_holding_hours
    }

    #[must_use]
    pub const fn coverage_tolerance(&self) -> Duration {
        self.coverage_tolerance
    }

    /// Evaluate `prediction` against `series` as seen at `as_of`.
    ///
    /// Samples before creation, after the holding window or after `as_of`
    /// are ignored. The earliest crossing decides; a sample beyond several
    /// take-profits records the nearest one.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Insufficient`] when the series is empty, out of
    /// order, or starts later than creation plus the coverage tolerance.
    pub fn evaluate(
        &self,
        prediction: &Prediction,
        series: &PriceSeries,
        as_of: DateTime<Utc>,
    ) -> Result<Evaluation, DataError> {
        if let Some(outcome) = prediction.outcome() {
            return Ok(Evaluation::AlreadyFinal(outcome.clone()));
        }

        let first = series.first().ok_or_else(|| DataError::Insufficient {
            reason: "price series is empty".into(),
        })?;
        if !series.is_monotonic() {
            return Err(DataError::Insufficient {
                reason: "price series timestamps are not monotonic".into(),
            });
        }
        if first.at > prediction.created_at + self.coverage_tolerance {
            return Err(DataError::Insufficient {
                reason: format!(
                    "first sample at {} is later than creation {} plus tolerance",
                    first.at.to_rfc3339(),
                    prediction.created_at.to_rfc3339()
                ),
            });
        }

        let deadline = prediction.deadline(self.max_holding_hours);
        let horizon = deadline.min(as_of);

        let mut last_seen: Option<&PriceSample> = None;
        for sample in series.samples() {
            if sample.at > horizon {
                break;
            }
            last_seen = Some(sample);
            if sample.at < prediction.created_at {
                continue;
            }
            if let Some(outcome) = crossing(prediction, sample, as_of) {
                return Ok(Evaluation::Finalized(outcome));
            }
        }

        if as_of < deadline {
            return Ok(Evaluation::Open);
        }

        let mark = last_seen.ok_or_else(|| DataError::Insufficient {
            reason: "no price sample inside the holding window".into(),
        })?;
        Ok(Evaluation::Finalized(Outcome {
            verdict: Verdict::Expired,
            exit_price: mark.price,
            exit_at: mark.at,
            realized_r: prediction.targets.r_multiple(mark.price),
            target_hit: None,
            validated_at: as_of,
        }))
    }
}

fn crossing(prediction: &Prediction, sample: &PriceSample, as_of: DateTime<Utc>) -> Option<Outcome> {
    let targets = &prediction.targets;
    let price = sample.price;

    let beyond = |level: Decimal| match targets.direction() {
        Direction::Long => price >= level,
        Direction::Short => price <= level,
    };
    let stopped = match targets.direction() {
        Direction::Long => price <= targets.stop_loss(),
        Direction::Short => price >= targets.stop_loss(),
    };

    // Take-profits are nearest first, so the first match is the nearest.
    if let Some((index, level)) = targets
        .take_profits()
        .iter()
        .enumerate()
        .find(|(_, level)| beyond(**level))
    {
        return Some(Outcome {
            verdict: Verdict::Win,
            exit_price: *level,
            exit_at: sample.at,
            realized_r: targets.r_multiple(*level),
            target_hit: Some(index),
            validated_at: as_of,
        });
    }

    stopped.then(|| Outcome {
        verdict: Verdict::Loss,
        exit_price: targets.stop_loss(),
        exit_at: sample.at,
        realized_r: targets.r_multiple(targets.stop_loss()),
        target_hit: None,
        validated_at: as_of,
    })
}
