//! Persistence port for predictions, aggregates and insights.
//!
//! One trait, two adapters: the Diesel/SQLite primary store and the JSON
//! file fallback. The application picks one at startup and talks to it
//! through `Arc<dyn RecordStore>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{PredictionId, Symbol};
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::{Mode, Prediction, Status};
use crate::domain::stats::{AggregateBucket, Dimension};
use crate::error::Result;

/// Selection criteria for predictions.
///
/// Results are always ordered by creation timestamp, then id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionFilter {
    pub status: Option<Status>,
    pub mode: Option<Mode>,
    pub symbol: Option<Symbol>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
    /// Inclusive lower bound on validation time.
    pub validated_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on validation time.
    pub validated_until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl PredictionFilter {
    /// Pending predictions only.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(Status::Pending),
            ..Self::default()
        }
    }

    /// Terminal predictions validated within `[from, until)`.
    #[must_use]
    pub fn validated_between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            validated_from: Some(from),
            validated_until: Some(until),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `prediction` satisfies every criterion except `limit`.
    #[must_use]
    pub fn matches(&self, prediction: &Prediction) -> bool {
        if self.status.is_some_and(|s| s != prediction.status()) {
            return false;
        }
        if self.mode.is_some_and(|m| m != prediction.mode) {
            return false;
        }
        if self
            .symbol
            .as_ref()
            .is_some_and(|s| *s != prediction.snapshot.symbol)
        {
            return false;
        }
        if self.created_from.is_some_and(|t| prediction.created_at < t)
            || self.created_until.is_some_and(|t| prediction.created_at >= t)
        {
            return false;
        }
        if self.validated_from.is_some() || self.validated_until.is_some() {
            let Some(outcome) = prediction.outcome() else {
                return false;
            };
            if self.validated_from.is_some_and(|t| outcome.validated_at < t)
                || self.validated_until.is_some_and(|t| outcome.validated_at >= t)
            {
                return false;
            }
        }
        true
    }
}

/// An aggregate bucket as stored for a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBucket {
    pub period: PeriodId,
    pub computed_at: DateTime<Utc>,
    pub bucket: AggregateBucket,
}

/// Selection criteria for stored buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketFilter {
    pub period: Option<PeriodId>,
    pub dimension: Option<Dimension>,
    /// Inclusive lower bound on period start.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on period start.
    pub until: Option<DateTime<Utc>>,
}

impl BucketFilter {
    #[must_use]
    pub fn for_period(period: PeriodId) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, stored: &StoredBucket) -> bool {
        let start = stored.period.start();
        self.period.map_or(true, |p| p == stored.period)
            && self.dimension.map_or(true, |d| d == stored.bucket.dimension)
            && self.since.map_or(true, |t| start >= t)
            && self.until.map_or(true, |t| start < t)
    }
}

/// Selection criteria for insight history, by period start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl InsightFilter {
    #[must_use]
    pub fn matches(&self, record: &InsightRecord) -> bool {
        let start = record.period.start();
        self.since.map_or(true, |t| start >= t) && self.until.map_or(true, |t| start < t)
    }
}

/// Durable storage backend.
///
/// Implementations do not enforce lifecycle rules beyond insight
/// uniqueness; the persistence facade in the application layer does.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Insert or replace a prediction by id.
    async fn save_prediction(&self, prediction: &Prediction) -> Result<()>;

    /// Get a prediction by id.
    async fn get_prediction(&self, id: &PredictionId) -> Result<Option<Prediction>>;

    /// Predictions matching `filter`, ordered by creation time then id.
    async fn query_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>>;

    /// Replace every bucket stored for `period` with `buckets`.
    async fn replace_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Buckets matching `filter`, ordered by period start, dimension, value.
    async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>>;

    /// Insert an insight. Fails with `InvariantError::InsightExists` when
    /// the period already has one.
    async fn insert_insight(&self, record: &InsightRecord) -> Result<()>;

    async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>>;

    /// The insight with the highest version.
    async fn latest_insight(&self) -> Result<Option<InsightRecord>>;

    /// Insights matching `filter`, ordered by version.
    async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()>;
}
