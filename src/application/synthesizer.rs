//! Insight synthesis: bucket statistics in, bounded parameter changes out.
//!
//! Every cycle produces exactly one [`InsightRecord`]. Only buckets with at
//! least `min_evidence` trades influence deltas and setup flags; smaller
//! buckets still show up in the rankings, marked ineligible.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::insight::{
    Evidence, InsightRecord, ParameterSet, RankedBucket, SetupFlag, CONFIDENCE_SCALE, RISK_SCALE,
    WEIGHT_PREFIX,
};
use crate::domain::period::PeriodId;
use crate::domain::stats::{confidence_midpoint, AggregateBucket, Dimension};

/// Absolute bounds on the confidence scaling factor.
pub const CONFIDENCE_SCALE_BOUNDS: (f64, f64) = (0.8, 1.2);
/// Absolute bounds on the risk scaling factor.
pub const RISK_SCALE_BOUNDS: (f64, f64) = (0.7, 1.2);
/// Absolute bounds on a signal weight.
pub const WEIGHT_BOUNDS: (f64, f64) = (0.0, 1.0);

/// Tunables for [`InsightSynthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPolicy {
    /// Minimum trades for a bucket to influence anything.
    pub min_evidence: u32,
    /// Entries in each best/worst ranking.
    pub top_n: usize,
    /// Largest per-cycle move of a single weight (and of the risk scale).
    pub max_weight_step: f64,
    /// Largest per-cycle move of the confidence scale.
    pub max_confidence_step: f64,
    /// Multiplier on the R gap before clamping weight deltas.
    pub weight_gain: f64,
    /// Multiplier on the calibration gap before clamping.
    pub confidence_gain: f64,
    /// Average R at or above which an eligible setup is flagged `include`.
    pub include_min_r: f64,
    /// Expectancy above which risk is scaled up.
    pub risk_up_expectancy: f64,
    /// Starting weights when no previous insight exists.
    pub base_weights: BTreeMap<String, f64>,
    /// Starting weight for signals missing from the previous parameters.
    pub default_weight: f64,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        let base_weights = [
            ("price_action", 0.25),
            ("volume_flow", 0.20),
            ("volatility", 0.15),
            ("momentum", 0.15),
            ("funding_sentiment", 0.15),
            ("macro_context", 0.10),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            min_evidence: 5,
            top_n: 3,
            max_weight_step: 0.05,
            max_confidence_step: 0.1,
            weight_gain: 0.1,
            confidence_gain: 0.5,
            include_min_r: 0.5,
            risk_up_expectancy: 0.3,
            base_weights,
            default_weight: 0.1,
        }
    }
}

/// Turns aggregate buckets into versioned insight records.
#[derive(Debug, Clone, Default)]
pub struct InsightSynthesizer {
    policy: SynthesisPolicy,
}

impl InsightSynthesizer {
    #[must_use]
    pub const fn new(policy: SynthesisPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &SynthesisPolicy {
        &self.policy
    }

    /// Build the insight record for `period`.
    ///
    /// `previous` supplies the parameters the deltas are applied to and the
    /// version to increment.
    #[must_use]
    pub fn synthesize(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        previous: Option<&InsightRecord>,
        generated_at: DateTime<Utc>,
    ) -> InsightRecord {
        let policy = &self.policy;
        let eligible = |b: &AggregateBucket| b.stats.trades >= policy.min_evidence;

        let setups: Vec<&AggregateBucket> = buckets
            .iter()
            .filter(|b| b.dimension == Dimension::Setup)
            .collect();
        let times: Vec<&AggregateBucket> =
            buckets.iter().filter(|b| b.dimension.is_time()).collect();

        let eligible_setups: Vec<&AggregateBucket> =
            setups.iter().copied().filter(|b| eligible(*b)).collect();
        let eligible_confidence: Vec<&AggregateBucket> = buckets
            .iter()
            .filter(|b| b.dimension == Dimension::Confidence && eligible(*b))
            .collect();

        let mut deltas = BTreeMap::new();
        if let Some(expectancy) = trade_weighted_r(&eligible_setups) {
            for (signal, delta) in self.weight_deltas(&eligible_setups, expectancy) {
                deltas.insert(format!("{WEIGHT_PREFIX}{signal}"), delta);
            }
            deltas.insert(RISK_SCALE.to_string(), self.risk_delta(expectancy));
        }
        if let Some(delta) = self.confidence_delta(&eligible_confidence) {
            deltas.insert(CONFIDENCE_SCALE.to_string(), delta);
        }

        let mut setup_flags = BTreeMap::new();
        for bucket in &eligible_setups {
            let average_r = bucket.stats.average_r();
            let losing = bucket.stats.profit_factor().is_some_and(|pf| pf < 1.0);
            if average_r < 0.0 && losing {
                setup_flags.insert(bucket.value.clone(), SetupFlag::Exclude);
            } else if average_r >= policy.include_min_r {
                setup_flags.insert(bucket.value.clone(), SetupFlag::Include);
            }
        }

        let calibration_warnings = eligible_confidence
            .iter()
            .filter_map(|b| {
                b.calibration.as_ref().filter(|c| c.warning).map(|c| {
                    format!(
                        "confidence {}: predicted {:.0}%, actual {:.0}%",
                        b.value,
                        c.predicted * 100.0,
                        c.actual * 100.0
                    )
                })
            })
            .collect();

        let eligible_count = buckets.iter().filter(|b| eligible(*b)).count();
        let evidence = Evidence {
            total_trades: total_trades(buckets),
            eligible_buckets: u32::try_from(eligible_count).unwrap_or(u32::MAX),
            ineligible_buckets: u32::try_from(buckets.len() - eligible_count).unwrap_or(u32::MAX),
        };

        let parameters = self.apply(previous.map(|p| &p.parameters), &deltas);
        let version = previous.map_or(1, |p| p.version + 1);

        debug!(
            period = %period,
            version = version,
            deltas = deltas.len(),
            eligible = evidence.eligible_buckets,
            "Synthesized insight"
        );

        InsightRecord {
            period,
            version,
            generated_at,
            best_setups: self.ranked(&setups, best_first),
            worst_setups: self.ranked(&setups, worst_first),
            best_times: self.ranked(&times, best_first),
            worst_times: self.ranked(&times, worst_first),
            deltas,
            setup_flags,
            calibration_warnings,
            evidence,
            parameters,
        }
    }

    fn ranked(
        &self,
        buckets: &[&AggregateBucket],
        order: fn(&AggregateBucket, &AggregateBucket) -> Ordering,
    ) -> Vec<RankedBucket> {
        let mut sorted = buckets.to_vec();
        sorted.sort_by(|a, b| order(*a, *b));
        sorted
            .into_iter()
            .take(self.policy.top_n)
            .map(|b| RankedBucket::from_bucket(b, b.stats.trades >= self.policy.min_evidence))
            .collect()
    }

    fn weight_deltas(&self, setups: &[&AggregateBucket], expectancy: f64) -> BTreeMap<String, f64> {
        let signals: BTreeSet<&str> = setups
            .iter()
            .filter(|b| b.value != "untagged")
            .flat_map(|b| b.value.split('+'))
            .collect();

        signals
            .into_iter()
            .filter_map(|signal| {
                let containing: Vec<&AggregateBucket> = setups
                    .iter()
                    .copied()
                    .filter(|b| b.value.split('+').any(|s| s == signal))
                    .collect();
                let signal_r = trade_weighted_r(&containing)?;
                let step = self.policy.max_weight_step;
                let delta = ((signal_r - expectancy) * self.policy.weight_gain).clamp(-step, step);
                Some((signal.to_string(), delta))
            })
            .collect()
    }

    fn risk_delta(&self, expectancy: f64) -> f64 {
        let step = self.policy.max_weight_step;
        if expectancy > self.policy.risk_up_expectancy {
            step
        } else if expectancy < 0.0 {
            -step
        } else {
            0.0
        }
    }

    fn confidence_delta(&self, buckets: &[&AggregateBucket]) -> Option<f64> {
        let mut trades = 0.0;
        let mut weighted_gap = 0.0;
        for bucket in buckets {
            let Some(predicted) = confidence_midpoint(&bucket.value) else {
                continue;
            };
            let n = f64::from(bucket.stats.trades);
            weighted_gap += n * (bucket.stats.win_rate() - predicted);
            trades += n;
        }
        if trades == 0.0 {
            return None;
        }
        let step = self.policy.max_confidence_step;
        Some((weighted_gap / trades * self.policy.confidence_gain).clamp(-step, step))
    }

    fn apply(&self, previous: Option<&ParameterSet>, deltas: &BTreeMap<String, f64>) -> ParameterSet {
        let mut parameters = previous
            .cloned()
            .unwrap_or_else(|| ParameterSet::with_weights(self.policy.base_weights.clone()));

        for (name, delta) in deltas {
            if let Some(signal) = name.strip_prefix(WEIGHT_PREFIX) {
                let current = parameters
                    .weight(signal)
                    .or_else(|| self.policy.base_weights.get(signal).copied())
                    .unwrap_or(self.policy.default_weight);
                parameters
                    .weights
                    .insert(signal.to_string(), clamp(current + delta, WEIGHT_BOUNDS));
            }
        }
        if let Some(delta) = deltas.get(CONFIDENCE_SCALE) {
            parameters.confidence_scale =
                clamp(parameters.confidence_scale + delta, CONFIDENCE_SCALE_BOUNDS);
        }
        if let Some(delta) = deltas.get(RISK_SCALE) {
            parameters.risk_scale = clamp(parameters.risk_scale + delta, RISK_SCALE_BOUNDS);
        }
        parameters
    }
}

fn clamp(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

fn trade_weighted_r(buckets: &[&AggregateBucket]) -> Option<f64> {
    let trades: u32 = buckets.iter().map(|b| b.stats.trades).sum();
    if trades == 0 {
        return None;
    }
    let sum_r: f64 = buckets.iter().map(|b| b.stats.sum_r).sum();
    Some(sum_r / f64::from(trades))
}

fn total_trades(buckets: &[AggregateBucket]) -> u32 {
    // Each record sits in exactly one bucket per dimension.
    let dimension = buckets
        .iter()
        .map(|b| b.dimension)
        .find(|d| *d == Dimension::Setup)
        .or_else(|| buckets.first().map(|b| b.dimension));
    dimension.map_or(0, |d| {
        buckets
            .iter()
            .filter(|b| b.dimension == d)
            .map(|b| b.stats.trades)
            .sum()
    })
}

fn best_first(a: &AggregateBucket, b: &AggregateBucket) -> Ordering {
    b.stats
        .average_r()
        .total_cmp(&a.stats.average_r())
        .then_with(|| b.stats.trades.cmp(&a.stats.trades))
        .then_with(|| a.key().cmp(&b.key()))
}

fn worst_first(a: &AggregateBucket, b: &AggregateBucket) -> Ordering {
    a.stats
        .average_r()
        .total_cmp(&b.stats.average_r())
        .then_with(|| b.stats.trades.cmp(&a.stats.trades))
        .then_with(|| a.key().cmp(&b.key()))
}
