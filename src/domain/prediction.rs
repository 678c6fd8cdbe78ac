//! Prediction records and their lifecycle.
//!
//! A [`Prediction`] is created pending by the external generator and is
//! terminalized exactly once with an [`Outcome`]. Realized fields only exist
//! on the [`Lifecycle::Validated`] variant, so a pending record cannot carry
//! an exit price and a terminal record cannot lose one.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use hindsight::domain::id::Symbol;
//! use hindsight::domain::prediction::{
//!     Direction, MarketSnapshot, Mode, Prediction, SentimentRegime, Status, Targets,
//!     VolatilityRegime,
//! };
//! use rust_decimal_macros::dec;
//!
//! let snapshot = MarketSnapshot {
//!     symbol: Symbol::new("BTC"),
//!     reference_price: dec!(100),
//!     volatility: VolatilityRegime::Normal,
//!     sentiment: SentimentRegime::Neutral,
//! };
//! let targets = Targets::try_new(Direction::Long, dec!(100), vec![dec!(110)], dec!(95)).unwrap();
//! let prediction = Prediction::try_new(
//!     Mode::Live,
//!     snapshot,
//!     targets,
//!     0.72,
//!     vec!["momentum".into(), "volume_flow".into()],
//!     Utc::now(),
//! )
//! .unwrap();
//!
//! assert_eq!(prediction.status(), Status::Pending);
//! assert_eq!(prediction.setup_key(), "momentum+volume_flow");
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{PredictionId, Symbol};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a prediction was issued for real or as a rehearsal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Rehearsal,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Rehearsal => "rehearsal",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volatility regime observed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// Market sentiment regime observed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentRegime {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentRegime {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtremeFear => "extreme_fear",
            Self::Fear => "fear",
            Self::Neutral => "neutral",
            Self::Greed => "greed",
            Self::ExtremeGreed => "extreme_greed",
        }
    }
}

/// Market context captured when the prediction was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub reference_price: Decimal,
    pub volatility: VolatilityRegime,
    pub sentiment: SentimentRegime,
}

/// Entry, take-profit and stop-loss levels for one prediction.
///
/// Take-profits are kept ordered by distance from entry, nearest first.
/// Deserialization runs the same checks as [`Targets::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTargets")]
pub struct Targets {
    direction: Direction,
    entry: Decimal,
    take_profits: Vec<Decimal>,
    stop_loss: Decimal,
}

/// Unchecked wire form of [`Targets`].
#[derive(Deserialize)]
struct RawTargets {
    direction: Direction,
    entry: Decimal,
    take_profits: Vec<Decimal>,
    stop_loss: Decimal,
}

impl TryFrom<RawTargets> for Targets {
    type Error = DomainError;

    fn try_from(raw: RawTargets) -> Result<Self, Self::Error> {
        Self::try_new(raw.direction, raw.entry, raw.take_profits, raw.stop_loss)
    }
}

impl Targets {
    /// Validate and build a set of target levels.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] when any price is non-positive, the
    /// take-profit list is empty, or a level sits on the wrong side of entry.
    pub fn try_new(
        direction: Direction,
        entry: Decimal,
        mut take_profits: Vec<Decimal>,
        stop_loss: Decimal,
    ) -> Result<Self, DomainError> {
        for price in std::iter::once(&entry)
            .chain(take_profits.iter())
            .chain(std::iter::once(&stop_loss))
        {
            if *price <= Decimal::ZERO {
                return Err(DomainError::NonPositivePrice { price: *price });
            }
        }
        if take_profits.is_empty() {
            return Err(DomainError::EmptyTakeProfits);
        }

        let stop_ok = match direction {
            Direction::Long => stop_loss < entry,
            Direction::Short => stop_loss > entry,
        };
        if !stop_ok {
            return Err(DomainError::StopOnWrongSide {
                entry,
                stop: stop_loss,
            });
        }

        if let Some(bad) = take_profits.iter().find(|tp| match direction {
            Direction::Long => **tp <= entry,
            Direction::Short => **tp >= entry,
        }) {
            return Err(DomainError::TargetOnWrongSide {
                entry,
                target: *bad,
            });
        }

        take_profits.sort_by_key(|tp| (*tp - entry).abs());
        take_profits.dedup();

        Ok(Self {
            direction,
            entry,
            take_profits,
            stop_loss,
        })
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn entry(&self) -> Decimal {
        self.entry
    }

    /// Take-profit levels, nearest to entry first.
    #[must_use]
    pub fn take_profits(&self) -> &[Decimal] {
        &self.take_profits
    }

    #[must_use]
    pub const fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    /// Realized R multiple for an exit at `exit`.
    ///
    /// One R is the distance from entry to stop, so a stop-out is always
    /// exactly `-1.0`. Computed in decimals and converted once at the end.
    #[must_use]
    pub fn r_multiple(&self, exit: Decimal) -> f64 {
        let (reward, risk) = match self.direction {
            Direction::Long => (exit - self.entry, self.entry - self.stop_loss),
            Direction::Short => (self.entry - exit, self.stop_loss - self.entry),
        };
        reward
            .checked_div(risk)
            .and_then(|r| r.to_f64())
            .unwrap_or(0.0)
    }
}

/// Final classification of a validated prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Win,
    Loss,
    Expired,
}

/// Lifecycle status, derived from [`Lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Win,
    Loss,
    Expired,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "expired" => Ok(Self::Expired),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

impl From<Verdict> for Status {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Win => Self::Win,
            Verdict::Loss => Self::Loss,
            Verdict::Expired => Self::Expired,
        }
    }
}

/// Realized result of a terminal prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub verdict: Verdict,
    pub exit_price: Decimal,
    pub exit_at: DateTime<Utc>,
    pub realized_r: f64,
    /// Index into [`Targets::take_profits`] of the level hit first.
    pub target_hit: Option<usize>,
    pub validated_at: DateTime<Utc>,
}

/// Pending or validated with an outcome. There is no way back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "lowercase")]
pub enum Lifecycle {
    Pending,
    Validated(Outcome),
}

/// A trading prediction awaiting or carrying its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub created_at: DateTime<Utc>,
    pub mode: Mode,
    pub snapshot: MarketSnapshot,
    pub targets: Targets,
    pub confidence: f64,
    /// Setup tags in the order given: trimmed, lower-cased, first
    /// occurrence kept.
    pub setup_tags: Vec<String>,
    /// Overrides the configured holding window when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_holding_hours: Option<u32>,
    lifecycle: Lifecycle,
}

impl Prediction {
    /// Build a new pending prediction.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::ConfidenceOutOfRange`] when `confidence` is not
    /// a probability.
    pub fn try_new(
        mode: Mode,
        snapshot: MarketSnapshot,
        targets: Targets,
        confidence: f64,
        setup_tags: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DomainError::ConfidenceOutOfRange { confidence });
        }

        Ok(Self {
            id: PredictionId::new(),
            created_at,
            mode,
            snapshot,
            targets,
            confidence,
            setup_tags: canonical_tags(setup_tags),
            max_holding_hours: None,
            lifecycle: Lifecycle::Pending,
        })
    }

    /// Set a per-prediction holding window.
    #[must_use]
    pub const fn with_max_holding_hours(mut self, hours: u32) -> Self {
        self.max_holding_hours = Some(hours);
        self
    }

    #[must_use]
    pub const fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.lifecycle {
            Lifecycle::Pending => None,
            Lifecycle::Validated(outcome) => Some(outcome),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.outcome()
            .map_or(Status::Pending, |outcome| outcome.verdict.into())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// The setup bucket value, or `untagged` when there are no tags.
    ///
    /// Tags are joined in sorted order so the same set always lands in the
    /// same bucket.
    #[must_use]
    pub fn setup_key(&self) -> String {
        if self.setup_tags.is_empty() {
            return "untagged".to_string();
        }
        let mut tags: Vec<&str> = self.setup_tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags.join("+")
    }

    /// Holding window, using `default_hours` unless overridden.
    #[must_use]
    pub fn holding_window(&self, default_hours: u32) -> Duration {
        Duration::hours(i64::from(self.max_holding_hours.unwrap_or(default_hours)))
    }

    /// End of the holding window.
    #[must_use]
    pub fn deadline(&self, default_hours: u32) -> DateTime<Utc> {
        self.created_at + self.holding_window(default_hours)
    }

    /// Move a pending record to its terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::IllegalTransition`] if the record is already
    /// terminal; the record is left untouched.
    pub fn finalize(&mut self, outcome: Outcome) -> Result<(), DomainError> {
        if let Lifecycle::Validated(existing) = &self.lifecycle {
            return Err(DomainError::IllegalTransition {
                from: existing.verdict.into(),
                to: outcome.verdict.into(),
            });
        }
        self.lifecycle = Lifecycle::Validated(outcome);
        Ok(())
    }
}

fn canonical_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
