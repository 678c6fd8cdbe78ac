//! Evaluation, learning and scheduling configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::application::aggregator::{PerformanceAggregator, DEFAULT_CALIBRATION_THRESHOLD};
use crate::application::evaluator::{
    OutcomeEvaluator, DEFAULT_COVERAGE_TOLERANCE_SECS, DEFAULT_MAX_HOLDING_HOURS,
};
use crate::application::scheduler::Cadence;
use crate::application::synthesizer::{InsightSynthesizer, SynthesisPolicy};
use crate::domain::stats::Dimension;

/// Outcome evaluation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Holding window for predictions without their own.
    #[serde(default = "default_max_holding_hours")]
    pub max_holding_hours: u32,
    /// Allowed gap between creation and the first price sample.
    #[serde(default = "default_coverage_tolerance_secs")]
    pub coverage_tolerance_secs: i64,
}

const fn default_max_holding_hours() -> u32 {
    DEFAULT_MAX_HOLDING_HOURS
}

const fn default_coverage_tolerance_secs() -> i64 {
    DEFAULT_COVERAGE_TOLERANCE_SECS
}

impl EvaluationConfig {
    #[must_use]
    pub fn evaluator(&self) -> OutcomeEvaluator {
        OutcomeEvaluator::new(
            self.max_holding_hours,
            chrono::Duration::seconds(self.coverage_tolerance_secs),
        )
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_holding_hours: default_max_holding_hours(),
            coverage_tolerance_secs: default_coverage_tolerance_secs(),
        }
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Calibration gap (fraction) that raises a warning.
    #[serde(default = "default_calibration_threshold")]
    pub calibration_threshold: f64,
    /// Dimensions to aggregate, in output order.
    #[serde(default = "default_groupings")]
    pub groupings: Vec<Dimension>,
    /// Count rehearsal predictions as evidence.
    #[serde(default)]
    pub include_rehearsal: bool,
}

const fn default_calibration_threshold() -> f64 {
    DEFAULT_CALIBRATION_THRESHOLD
}

fn default_groupings() -> Vec<Dimension> {
    Dimension::ALL.to_vec()
}

impl AggregationConfig {
    #[must_use]
    pub const fn aggregator(&self) -> PerformanceAggregator {
        PerformanceAggregator::new(self.calibration_threshold)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            calibration_threshold: default_calibration_threshold(),
            groupings: default_groupings(),
            include_rehearsal: false,
        }
    }
}

/// Insight synthesis settings. Unset fields keep the policy defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisConfig {
    pub min_evidence: Option<u32>,
    pub top_n: Option<usize>,
    pub max_weight_step: Option<f64>,
    pub max_confidence_step: Option<f64>,
    pub weight_gain: Option<f64>,
    pub confidence_gain: Option<f64>,
    pub include_min_r: Option<f64>,
    pub risk_up_expectancy: Option<f64>,
    /// Replaces the built-in starting weights when non-empty.
    #[serde(default)]
    pub base_weights: BTreeMap<String, f64>,
}

impl SynthesisConfig {
    #[must_use]
    pub fn policy(&self) -> SynthesisPolicy {
        let defaults = SynthesisPolicy::default();
        SynthesisPolicy {
            min_evidence: self.min_evidence.unwrap_or(defaults.min_evidence),
            top_n: self.top_n.unwrap_or(defaults.top_n),
            max_weight_step: self.max_weight_step.unwrap_or(defaults.max_weight_step),
            max_confidence_step: self
                .max_confidence_step
                .unwrap_or(defaults.max_confidence_step),
            weight_gain: self.weight_gain.unwrap_or(defaults.weight_gain),
            confidence_gain: self.confidence_gain.unwrap_or(defaults.confidence_gain),
            include_min_r: self.include_min_r.unwrap_or(defaults.include_min_r),
            risk_up_expectancy: self
                .risk_up_expectancy
                .unwrap_or(defaults.risk_up_expectancy),
            base_weights: if self.base_weights.is_empty() {
                defaults.base_weights
            } else {
                self.base_weights.clone()
            },
            default_weight: defaults.default_weight,
        }
    }

    #[must_use]
    pub fn synthesizer(&self) -> InsightSynthesizer {
        InsightSynthesizer::new(self.policy())
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_true")]
    pub weekly: bool,
    #[serde(default = "default_true")]
    pub monthly: bool,
}

const fn default_tick_secs() -> u64 {
    60
}

const fn default_true() -> bool {
    true
}

impl ScheduleConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    #[must_use]
    pub const fn cadence(&self) -> Cadence {
        Cadence {
            weekly: self.weekly,
            monthly: self.monthly,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            weekly: true,
            monthly: true,
        }
    }
}
