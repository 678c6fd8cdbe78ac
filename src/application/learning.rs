//! Learning cycle: aggregate a completed period, then synthesize its insight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::application::aggregator::PerformanceAggregator;
use crate::application::persistence::Persistence;
use crate::application::synthesizer::InsightSynthesizer;
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::Mode;
use crate::domain::stats::{AggregateBucket, Dimension};
use crate::error::{InvariantError, Result};
use crate::port::outbound::notifier::{Event, Notifier};
use crate::port::outbound::store::PredictionFilter;

/// What a learning request ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum LearningOutcome {
    /// The period already has an insight; nothing was recomputed.
    Skipped(PeriodId),
    /// A new insight was stored.
    Completed(Box<InsightRecord>),
}

/// Runs aggregation and synthesis for one period.
pub struct LearningService {
    persistence: Persistence,
    aggregator: PerformanceAggregator,
    synthesizer: InsightSynthesizer,
    notifier: Arc<dyn Notifier>,
    groupings: Vec<Dimension>,
    include_rehearsal: bool,
}

impl LearningService {
    #[must_use]
    pub fn new(
        persistence: Persistence,
        aggregator: PerformanceAggregator,
        synthesizer: InsightSynthesizer,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            persistence,
            aggregator,
            synthesizer,
            notifier,
            groupings: Dimension::ALL.to_vec(),
            include_rehearsal: false,
        }
    }

    /// Restrict or reorder the dimensions aggregated.
    #[must_use]
    pub fn with_groupings(mut self, groupings: Vec<Dimension>) -> Self {
        self.groupings = groupings;
        self
    }

    /// Count rehearsal predictions as evidence too.
    #[must_use]
    pub const fn with_rehearsal(mut self, include: bool) -> Self {
        self.include_rehearsal = include;
        self
    }

    #[must_use]
    pub fn groupings(&self) -> &[Dimension] {
        &self.groupings
    }

    /// Whether `period` already has its insight.
    pub async fn is_learned(&self, period: PeriodId) -> Result<bool> {
        Ok(self.persistence.get_insight(period).await?.is_some())
    }

    /// Recompute and store the buckets of `period`.
    pub async fn aggregate(
        &self,
        period: PeriodId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AggregateBucket>> {
        let (start, end) = (period.start(), period.end());
        let mut filter = PredictionFilter::validated_between(start, end);
        if !self.include_rehearsal {
            filter = filter.with_mode(Mode::Live);
        }

        let records = self.persistence.query(&filter).await?;
        let buckets = self
            .aggregator
            .aggregate(&records, start, end, &self.groupings);
        self.persistence.save_buckets(period, &buckets, now).await?;

        info!(
            period = %period,
            records = records.len(),
            buckets = buckets.len(),
            "Aggregated period"
        );
        Ok(buckets)
    }

    /// Build, store and announce the insight for `period`.
    ///
    /// The previous latest insight supplies the parameters the new deltas
    /// apply to.
    pub async fn synthesize(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        now: DateTime<Utc>,
    ) -> Result<InsightRecord> {
        let previous = self.persistence.latest_insight().await?;
        let record = self
            .synthesizer
            .synthesize(period, buckets, previous.as_ref(), now);
        self.persistence.save_insight(&record).await?;

        info!(
            period = %period,
            version = record.version,
            deltas = record.deltas.len(),
            warnings = record.calibration_warnings.len(),
            "Insight stored"
        );
        self.notifier
            .notify(Event::InsightReady(Box::new(record.clone())));
        Ok(record)
    }

    /// Aggregate then synthesize, unless the period is already learned.
    ///
    /// # Errors
    ///
    /// [`InvariantError::PeriodOpen`] when `now` is before the end of
    /// `period`; insights are write-once, so a partial period is refused.
    pub async fn learn(&self, period: PeriodId, now: DateTime<Utc>) -> Result<LearningOutcome> {
        if now < period.end() {
            return Err(InvariantError::PeriodOpen {
                period: period.to_string(),
                ends_at: period.end(),
            }
            .into());
        }
        if self.is_learned(period).await? {
            debug!(period = %period, "Insight exists, skipping");
            return Ok(LearningOutcome::Skipped(period));
        }
        let buckets = self.aggregate(period, now).await?;
        let record = self.synthesize(period, &buckets, now).await?;
        Ok(LearningOutcome::Completed(Box::new(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::persistence::Backend;
    use crate::domain::prediction::Verdict;
    use crate::error::Error;
    use crate::port::outbound::store::BucketFilter;
    use crate::testkit::config::fast_retry;
    use crate::testkit::domain::{t0, terminal_with};
    use crate::testkit::notifier::RecordingNotifier;
    use crate::testkit::store::MemoryStore;
    use chrono::Duration;

    fn service(notifier: &RecordingNotifier) -> (LearningService, Persistence) {
        let persistence =
            Persistence::new(Arc::new(MemoryStore::new()), Backend::Primary, fast_retry());
        let service = LearningService::new(
            persistence.clone(),
            PerformanceAggregator::default(),
            InsightSynthesizer::default(),
            Arc::new(notifier.clone()),
        );
        (service, persistence)
    }

    fn week() -> PeriodId {
        "2025-W20".parse().unwrap()
    }

    #[tokio::test]
    async fn learn_stores_buckets_and_insight() {
        let notifier = RecordingNotifier::new();
        let (service, persistence) = service(&notifier);
        for i in 0..6 {
            let created = t0() + Duration::hours(i);
            persistence
                .save(&terminal_with(
                    created,
                    &["momentum"],
                    0.75,
                    Verdict::Win,
                    2.0,
                    created + Duration::hours(1),
                ))
                .await
                .unwrap();
        }

        let outcome = service.learn(week(), week().end()).await.unwrap();
        let LearningOutcome::Completed(record) = outcome else {
            panic!("expected a new insight");
        };

        assert_eq!(record.version, 1);
        assert_eq!(record.evidence.total_trades, 6);
        assert_eq!(notifier.insights(), 1);
        let stored = persistence
            .query_buckets(&BucketFilter::for_period(week()))
            .await
            .unwrap();
        assert!(!stored.is_empty());
    }

    #[tokio::test]
    async fn learned_period_is_skipped() {
        let notifier = RecordingNotifier::new();
        let (service, _) = service(&notifier);

        service.learn(week(), week().end()).await.unwrap();
        let again = service.learn(week(), week().end()).await.unwrap();

        assert_eq!(again, LearningOutcome::Skipped(week()));
        assert_eq!(notifier.insights(), 1);
    }

    #[tokio::test]
    async fn empty_period_still_produces_record() {
        let notifier = RecordingNotifier::new();
        let (service, _) = service(&notifier);

        let LearningOutcome::Completed(record) = service.learn(week(), week().end()).await.unwrap()
        else {
            panic!("expected a new insight");
        };
        assert!(!record.has_deltas());
        assert_eq!(record.evidence.total_trades, 0);
    }

    #[tokio::test]
    async fn versions_increase_across_periods() {
        let notifier = RecordingNotifier::new();
        let (service, persistence) = service(&notifier);

        service.learn(week(), week().end()).await.unwrap();
        service.learn(week().next(), week().next().end()).await.unwrap();

        let latest = persistence.latest_insight().await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.period, week().next());
    }

    #[tokio::test]
    async fn open_period_is_refused_and_learned_once_closed() {
        let notifier = RecordingNotifier::new();
        let (service, persistence) = service(&notifier);
        let monday_morning = week().start() + Duration::hours(8);

        let err = service.learn(week(), monday_morning).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Invariant(InvariantError::PeriodOpen { ref period, ends_at })
                if period == "2025-W20" && ends_at == week().end()
        ));
        assert!(persistence.get_insight(week()).await.unwrap().is_none());
        assert_eq!(notifier.insights(), 0);

        let outcome = service.learn(week(), week().end()).await.unwrap();
        assert!(matches!(outcome, LearningOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn rehearsal_predictions_are_excluded_by_default() {
        let notifier = RecordingNotifier::new();
        let (service, persistence) = service(&notifier);
        let mut rehearsal = terminal_with(
            t0(),
            &["momentum"],
            0.7,
            Verdict::Win,
            2.0,
            t0() + Duration::hours(1),
        );
        rehearsal.mode = Mode::Rehearsal;
        persistence.save(&rehearsal).await.unwrap();

        let buckets = service.aggregate(week(), week().end()).await.unwrap();
        assert!(buckets.is_empty());

        let service = service.with_rehearsal(true);
        let buckets = service.aggregate(week(), week().end()).await.unwrap();
        assert!(!buckets.is_empty());
    }
}
