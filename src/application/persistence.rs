//! Persistence facade over the active [`RecordStore`].
//!
//! The backend is chosen once at startup and never changes for the life of
//! the process. This facade adds write retries, the single terminalization
//! path for predictions, insight uniqueness and the snapshot side effect.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::application::snapshot::SnapshotWriter;
use crate::domain::error::DomainError;
use crate::domain::id::PredictionId;
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::{Outcome, Prediction};
use crate::domain::stats::AggregateBucket;
use crate::error::{Error, InvariantError, PersistenceError, Result};
use crate::port::outbound::store::{
    BucketFilter, InsightFilter, PredictionFilter, RecordStore, StoredBucket,
};

/// Which backend is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Primary,
    Fallback,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential backoff for write retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        self.initial_delay.mul_f64(factor.max(0.0))
    }
}

/// Result of a store health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub backend: Backend,
    pub store: &'static str,
    pub ping_ok: bool,
    pub detail: String,
}

impl StoreHealth {
    /// Healthy means a responsive primary.
    #[must_use]
    pub fn is_nominal(&self) -> bool {
        self.ping_ok && self.backend == Backend::Primary
    }
}

/// The only component allowed to touch durable storage.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn RecordStore>,
    backend: Backend,
    retry: RetryPolicy,
    snapshot: Option<Arc<SnapshotWriter>>,
}

impl Persistence {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, backend: Backend, retry: RetryPolicy) -> Self {
        Self {
            store,
            backend,
            retry,
            snapshot: None,
        }
    }

    /// Write a snapshot file after aggregate and insight writes.
    #[must_use]
    pub fn with_snapshot(mut self, writer: SnapshotWriter) -> Self {
        self.snapshot = Some(Arc::new(writer));
        self
    }

    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Insert or replace a prediction.
    ///
    /// Re-saving an identical record is a no-op write; a terminal record is
    /// never replaced by a different one.
    ///
    /// # Errors
    ///
    /// [`InvariantError::IllegalTransition`] when the stored record is
    /// terminal and `prediction` differs from it; nothing is written.
    pub async fn save(&self, prediction: &Prediction) -> Result<()> {
        if let Some(stored) = self.store.get_prediction(&prediction.id).await? {
            if stored.is_terminal() && stored != *prediction {
                warn!(
                    prediction = %prediction.id,
                    from = %stored.status(),
                    to = %prediction.status(),
                    "Rejected overwrite of terminal prediction"
                );
                return Err(InvariantError::IllegalTransition {
                    id: prediction.id.to_string(),
                    from: stored.status(),
                    to: prediction.status(),
                }
                .into());
            }
        }

        self.with_retry("save prediction", || self.store.save_prediction(prediction))
            .await
    }

    pub async fn get(&self, id: &PredictionId) -> Result<Option<Prediction>> {
        self.store.get_prediction(id).await
    }

    pub async fn query(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        self.store.query_predictions(filter).await
    }

    /// Terminalize a pending prediction with `outcome`.
    ///
    /// # Errors
    ///
    /// [`InvariantError::IllegalTransition`] when the stored record is
    /// already terminal; nothing is written in that case.
    pub async fn record_outcome(&self, id: &PredictionId, outcome: Outcome) -> Result<Prediction> {
        let mut prediction = self
            .get(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound { id: id.to_string() })?;

        prediction.finalize(outcome).map_err(|err| match err {
            DomainError::IllegalTransition { from, to } => {
                Error::Invariant(InvariantError::IllegalTransition {
                    id: id.to_string(),
                    from,
                    to,
                })
            }
            other => Error::Domain(other),
        })?;

        self.save(&prediction).await?;
        debug!(prediction = %id, status = %prediction.status(), "Recorded outcome");
        Ok(prediction)
    }

    /// Replace the buckets of `period` with a fresh full recompute.
    pub async fn save_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_retry("save buckets", || {
            self.store.replace_buckets(period, buckets, computed_at)
        })
        .await?;

        if let Some(writer) = &self.snapshot {
            if let Err(e) = writer.record_buckets(period, buckets) {
                warn!(error = %e, path = %writer.path().display(), "Failed to write snapshot");
            }
        }
        Ok(())
    }

    pub async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>> {
        self.store.query_buckets(filter).await
    }

    /// Append an insight record.
    ///
    /// # Errors
    ///
    /// [`InvariantError::InsightExists`] when the period already has one.
    pub async fn save_insight(&self, record: &InsightRecord) -> Result<()> {
        if self.store.get_insight(record.period).await?.is_some() {
            return Err(InvariantError::InsightExists {
                period: record.period.to_string(),
            }
            .into());
        }

        self.with_retry("save insight", || self.store.insert_insight(record))
            .await?;

        if let Some(writer) = &self.snapshot {
            if let Err(e) = writer.record_insight(record) {
                warn!(error = %e, path = %writer.path().display(), "Failed to write snapshot");
            }
        }
        Ok(())
    }

    pub async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>> {
        self.store.get_insight(period).await
    }

    pub async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        self.store.latest_insight().await
    }

    pub async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>> {
        self.store.query_insights(filter).await
    }

    /// Report the active backend and whether it answers a ping.
    pub async fn health_check(&self) -> StoreHealth {
        let ping = self.store.ping().await;
        let ping_ok = ping.is_ok();
        let detail = match (self.backend, &ping) {
            (Backend::Fallback, Ok(())) => "fallback active".to_string(),
            (Backend::Fallback, Err(e)) => format!("fallback active, ping failed: {e}"),
            (Backend::Primary, Ok(())) => "ok".to_string(),
            (Backend::Primary, Err(e)) => format!("ping failed: {e}"),
        };
        StoreHealth {
            backend: self.backend,
            store: self.store.backend_name(),
            ping_ok,
            detail,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.max_retries + 1;
        let mut retry = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_invariant() => return Err(e),
                Err(e) if retry < self.retry.max_retries => {
                    let delay = self.retry.delay(retry);
                    warn!(
                        operation = operation,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Store write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    return Err(PersistenceError::RetriesExhausted {
                        operation,
                        attempts,
                        last_error: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }
}
