//! Record stores for tests.
//!
//! [`MemoryStore`] counts writes so idempotence can be asserted;
//! [`FailingStore`] rejects a configurable number of writes to exercise
//! the retry path.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::outbound::file::JsonFileStore;
use crate::domain::id::PredictionId;
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::Prediction;
use crate::domain::stats::AggregateBucket;
use crate::error::{Error, Result};
use crate::port::outbound::store::{
    BucketFilter, InsightFilter, PredictionFilter, RecordStore, StoredBucket,
};

/// In-memory store that counts prediction writes.
pub struct MemoryStore {
    inner: JsonFileStore,
    prediction_writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: JsonFileStore::in_memory(),
            prediction_writes: AtomicU32::new(0),
        }
    }

    /// Number of `save_prediction` calls so far.
    pub fn prediction_writes(&self) -> u32 {
        self.prediction_writes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        self.prediction_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_prediction(prediction).await
    }

    async fn get_prediction(&self, id: &PredictionId) -> Result<Option<Prediction>> {
        self.inner.get_prediction(id).await
    }

    async fn query_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        self.inner.query_predictions(filter).await
    }

    async fn replace_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.replace_buckets(period, buckets, computed_at).await
    }

    async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>> {
        self.inner.query_buckets(filter).await
    }

    async fn insert_insight(&self, record: &InsightRecord) -> Result<()> {
        self.inner.insert_insight(record).await
    }

    async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>> {
        self.inner.get_insight(period).await
    }

    async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        self.inner.latest_insight().await
    }

    async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>> {
        self.inner.query_insights(filter).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Store whose first `n` writes fail with a database error.
///
/// Reads always succeed. `u32::MAX` fails every write.
pub struct FailingStore {
    inner: JsonFileStore,
    remaining_failures: AtomicU32,
    write_attempts: AtomicU32,
}

impl FailingStore {
    pub fn failing_writes(n: u32) -> Self {
        Self {
            inner: JsonFileStore::in_memory(),
            remaining_failures: AtomicU32::new(n),
            write_attempts: AtomicU32::new(0),
        }
    }

    /// Writes attempted, failed or not.
    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Fail the next `n` writes, replacing any remaining count.
    pub fn fail_next(&self, n: u32) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    fn attempt(&self) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                match n {
                    0 => None,
                    u32::MAX => Some(u32::MAX),
                    n => Some(n - 1),
                }
            })
            .is_ok();
        if failed {
            Err(Error::Database("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        self.attempt()?;
        self.inner.save_prediction(prediction).await
    }

    async fn get_prediction(&self, id: &PredictionId) -> Result<Option<Prediction>> {
        self.inner.get_prediction(id).await
    }

    async fn query_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        self.inner.query_predictions(filter).await
    }

    async fn replace_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.attempt()?;
        self.inner.replace_buckets(period, buckets, computed_at).await
    }

    async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>> {
        self.inner.query_buckets(filter).await
    }

    async fn insert_insight(&self, record: &InsightRecord) -> Result<()> {
        self.attempt()?;
        self.inner.insert_insight(record).await
    }

    async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>> {
        self.inner.get_insight(period).await
    }

    async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        self.inner.latest_insight().await
    }

    async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>> {
        self.inner.query_insights(filter).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
