//! Versioned insight records.
//!
//! An [`InsightRecord`] is produced once per learning period and never
//! modified afterwards. It carries both the per-cycle deltas and the
//! resulting absolute [`ParameterSet`], so a consumer only ever needs the
//! latest record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::PeriodId;
use super::stats::{AggregateBucket, BucketStats, Dimension};

/// Delta name for the confidence scaling factor.
pub const CONFIDENCE_SCALE: &str = "confidence_scale";
/// Delta name for the risk scaling factor.
pub const RISK_SCALE: &str = "risk_scale";
/// Prefix of per-signal weight deltas, e.g. `weight.momentum`.
pub const WEIGHT_PREFIX: &str = "weight.";

/// A bucket as it appears in an insight ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBucket {
    pub dimension: Dimension,
    pub value: String,
    pub stats: BucketStats,
    pub average_r: f64,
    pub win_rate: f64,
    /// False when the bucket is below the evidence threshold.
    pub eligible: bool,
}

impl RankedBucket {
    #[must_use]
    pub fn from_bucket(bucket: &AggregateBucket, eligible: bool) -> Self {
        Self {
            dimension: bucket.dimension,
            value: bucket.value.clone(),
            average_r: bucket.stats.average_r(),
            win_rate: bucket.stats.win_rate(),
            stats: bucket.stats.clone(),
            eligible,
        }
    }
}

/// Recommendation for a setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupFlag {
    Include,
    Exclude,
}

/// How much evidence backed the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub total_trades: u32,
    pub eligible_buckets: u32,
    pub ineligible_buckets: u32,
}

/// Absolute parameters consumed by the prediction generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub weights: BTreeMap<String, f64>,
    pub confidence_scale: f64,
    pub risk_scale: f64,
}

impl ParameterSet {
    /// Neutral scales with the given starting weights.
    #[must_use]
    pub fn with_weights(weights: BTreeMap<String, f64>) -> Self {
        Self {
            weights,
            confidence_scale: 1.0,
            risk_scale: 1.0,
        }
    }

    #[must_use]
    pub fn weight(&self, signal: &str) -> Option<f64> {
        self.weights.get(signal).copied()
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::with_weights(BTreeMap::new())
    }
}

/// Output of one learning cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub period: PeriodId,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub best_setups: Vec<RankedBucket>,
    pub worst_setups: Vec<RankedBucket>,
    pub best_times: Vec<RankedBucket>,
    pub worst_times: Vec<RankedBucket>,
    /// Named, bounded adjustments applied this cycle.
    pub deltas: BTreeMap<String, f64>,
    pub setup_flags: BTreeMap<String, SetupFlag>,
    pub calibration_warnings: Vec<String>,
    pub evidence: Evidence,
    pub parameters: ParameterSet,
}

impl InsightRecord {
    #[must_use]
    pub fn delta(&self, name: &str) -> Option<f64> {
        self.deltas.get(name).copied()
    }

    #[must_use]
    pub fn has_deltas(&self) -> bool {
        !self.deltas.is_empty()
    }
}
