//! SQLite record store implementation.
//!
//! Primary backend. Predictions and insights are stored as JSON documents
//! next to denormalized columns used for filtering; aggregates are stored
//! column per statistic so they can be inspected with plain SQL.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::adapter::outbound::sqlite::database::connection::{self, DbPool};
use crate::adapter::outbound::sqlite::database::model::{AggregateRow, InsightRow, PredictionRow};
use crate::adapter::outbound::sqlite::database::schema::{aggregates, insights, predictions};
use crate::domain::id::PredictionId;
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::Prediction;
use crate::domain::stats::{AggregateBucket, BucketStats, Calibration, Dimension};
use crate::error::{Error, InvariantError, Result};
use crate::port::outbound::store::{
    BucketFilter, InsightFilter, PredictionFilter, RecordStore, StoredBucket,
};

/// Fixed-width UTC timestamp; lexical order equals time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::Parse(e.to_string()))?
        .with_timezone(&Utc))
}

fn count(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| Error::Parse(format!("negative count {value}: {e}")))
}

fn db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    /// Create a store over an already migrated pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>>
    {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    fn prediction_row(prediction: &Prediction) -> Result<PredictionRow> {
        Ok(PredictionRow {
            id: prediction.id.to_string(),
            created_at: ts(prediction.created_at),
            mode: prediction.mode.as_str().to_string(),
            symbol: prediction.snapshot.symbol.to_string(),
            direction: prediction.targets.direction().as_str().to_string(),
            status: prediction.status().as_str().to_string(),
            confidence: prediction.confidence,
            setup_key: prediction.setup_key(),
            validated_at: prediction.outcome().map(|o| ts(o.validated_at)),
            record: serde_json::to_string(prediction).map_err(|e| Error::Parse(e.to_string()))?,
        })
    }

    fn prediction_from_row(row: PredictionRow) -> Result<Prediction> {
        serde_json::from_str(&row.record)
            .map_err(|e| Error::Parse(format!("prediction {}: {e}", row.id)))
    }

    fn aggregate_row(
        period: PeriodId,
        bucket: &AggregateBucket,
        computed_at: DateTime<Utc>,
    ) -> Result<AggregateRow> {
        let calibration = bucket
            .calibration
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Parse(e.to_string()))?;
        Ok(AggregateRow {
            period: period.to_string(),
            dimension: bucket.dimension.as_str().to_string(),
            value: bucket.value.clone(),
            period_start: ts(period.start()),
            trades: db_count(bucket.stats.trades),
            wins: db_count(bucket.stats.wins),
            losses: db_count(bucket.stats.losses),
            expired: db_count(bucket.stats.expired),
            sum_r: bucket.stats.sum_r,
            gross_profit_r: bucket.stats.gross_profit_r,
            gross_loss_r: bucket.stats.gross_loss_r,
            calibration,
            computed_at: ts(computed_at),
        })
    }

    fn aggregate_from_row(row: AggregateRow) -> Result<StoredBucket> {
        let period: PeriodId = row.period.parse()?;
        let dimension: Dimension = row.dimension.parse().map_err(Error::Parse)?;
        let calibration: Option<Calibration> = row
            .calibration
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(StoredBucket {
            period,
            computed_at: parse_ts(&row.computed_at)?,
            bucket: AggregateBucket {
                dimension,
                value: row.value,
                stats: BucketStats {
                    trades: count(row.trades)?,
                    wins: count(row.wins)?,
                    losses: count(row.losses)?,
                    expired: count(row.expired)?,
                    sum_r: row.sum_r,
                    gross_profit_r: row.gross_profit_r,
                    gross_loss_r: row.gross_loss_r,
                },
                calibration,
            },
        })
    }

    fn insight_row(record: &InsightRecord) -> Result<InsightRow> {
        Ok(InsightRow {
            period: record.period.to_string(),
            period_kind: record.period.kind().as_str().to_string(),
            period_start: ts(record.period.start()),
            version: i64::try_from(record.version).unwrap_or(i64::MAX),
            generated_at: ts(record.generated_at),
            record: serde_json::to_string(record).map_err(|e| Error::Parse(e.to_string()))?,
        })
    }

    fn insight_from_row(row: InsightRow) -> Result<InsightRecord> {
        serde_json::from_str(&row.record)
            .map_err(|e| Error::Parse(format!("insight {}: {e}", row.period)))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        let row = Self::prediction_row(prediction)?;
        let mut conn = self.conn()?;

        diesel::replace_into(predictions::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn get_prediction(&self, id: &PredictionId) -> Result<Option<Prediction>> {
        let mut conn = self.conn()?;

        let row: Option<PredictionRow> = predictions::table
            .find(id.as_str())
            .select(PredictionRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::prediction_from_row).transpose()
    }

    async fn query_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        let mut conn = self.conn()?;

        let mut query = predictions::table
            .select(PredictionRow::as_select())
            .into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(predictions::status.eq(status.as_str()));
        }
        if let Some(mode) = filter.mode {
            query = query.filter(predictions::mode.eq(mode.as_str()));
        }
        if let Some(symbol) = &filter.symbol {
            query = query.filter(predictions::symbol.eq(symbol.to_string()));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(predictions::created_at.ge(ts(from)));
        }
        if let Some(until) = filter.created_until {
            query = query.filter(predictions::created_at.lt(ts(until)));
        }
        if let Some(from) = filter.validated_from {
            query = query.filter(predictions::validated_at.ge(ts(from)));
        }
        if let Some(until) = filter.validated_until {
            query = query.filter(predictions::validated_at.lt(ts(until)));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<PredictionRow> = query
            .order((predictions::created_at.asc(), predictions::id.asc()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::prediction_from_row).collect()
    }

    async fn replace_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        let rows = buckets
            .iter()
            .map(|b| Self::aggregate_row(period, b, computed_at))
            .collect::<Result<Vec<_>>>()?;
        let period_key = period.to_string();
        let mut conn = self.conn()?;

        conn.transaction::<_, DieselError, _>(|conn| {
            diesel::delete(aggregates::table.filter(aggregates::period.eq(&period_key)))
                .execute(conn)?;
            if !rows.is_empty() {
                diesel::insert_into(aggregates::table)
                    .values(&rows)
                    .execute(conn)?;
            }
            Ok(())
        })
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>> {
        let mut conn = self.conn()?;

        let mut query = aggregates::table
            .select(AggregateRow::as_select())
            .into_boxed();
        if let Some(period) = filter.period {
            query = query.filter(aggregates::period.eq(period.to_string()));
        }
        if let Some(dimension) = filter.dimension {
            query = query.filter(aggregates::dimension.eq(dimension.as_str()));
        }
        if let Some(since) = filter.since {
            query = query.filter(aggregates::period_start.ge(ts(since)));
        }
        if let Some(until) = filter.until {
            query = query.filter(aggregates::period_start.lt(ts(until)));
        }

        let rows: Vec<AggregateRow> = query
            .order((
                aggregates::period_start.asc(),
                aggregates::dimension.asc(),
                aggregates::value.asc(),
            ))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::aggregate_from_row).collect()
    }

    async fn insert_insight(&self, record: &InsightRecord) -> Result<()> {
        let row = Self::insight_row(record)?;
        let mut conn = self.conn()?;

        diesel::insert_into(insights::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    Error::Invariant(InvariantError::InsightExists {
                        period: record.period.to_string(),
                    })
                }
                other => Error::Database(other.to_string()),
            })?;

        Ok(())
    }

    async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>> {
        let mut conn = self.conn()?;

        let row: Option<InsightRow> = insights::table
            .find(period.to_string())
            .select(InsightRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::insight_from_row).transpose()
    }

    async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        let mut conn = self.conn()?;

        let row: Option<InsightRow> = insights::table
            .select(InsightRow::as_select())
            .order(insights::version.desc())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::insight_from_row).transpose()
    }

    async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>> {
        let mut conn = self.conn()?;

        let mut query = insights::table.select(InsightRow::as_select()).into_boxed();
        if let Some(since) = filter.since {
            query = query.filter(insights::period_start.ge(ts(since)));
        }
        if let Some(until) = filter.until {
            query = query.filter(insights::period_start.lt(ts(until)));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<InsightRow> = query
            .order(insights::version.asc())
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::insight_from_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        connection::ping(&self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::sqlite::database::connection::{
        create_pool, run_migrations, DEFAULT_CONNECTION_TIMEOUT,
    };
    use crate::domain::prediction::Status;
    use crate::testkit::domain::{insight, pending_at, t0, terminal_at};
    use chrono::Duration;

    fn setup_test_db() -> DbPool {
        let pool = create_pool(":memory:", DEFAULT_CONNECTION_TIMEOUT).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        pool
    }

    fn bucket(dimension: Dimension, value: &str, trades: u32) -> AggregateBucket {
        AggregateBucket {
            dimension,
            value: value.to_string(),
            stats: BucketStats {
                trades,
                wins: trades,
                sum_r: f64::from(trades) * 2.0,
                gross_profit_r: f64::from(trades) * 2.0,
                ..BucketStats::default()
            },
            calibration: (dimension == Dimension::Confidence)
                .then(|| Calibration::new(0.75, 1.0, 0.15)),
        }
    }

    #[tokio::test]
    async fn save_and_get_prediction() {
        let store = SqliteRecordStore::new(setup_test_db());
        let prediction = pending_at(t0());

        store.save_prediction(&prediction).await.unwrap();
        let loaded = store.get_prediction(&prediction.id).await.unwrap();

        assert_eq!(loaded, Some(prediction));
    }

    #[tokio::test]
    async fn get_missing_prediction_is_none() {
        let store = SqliteRecordStore::new(setup_test_db());
        let loaded = store.get_prediction(&PredictionId::from("nope")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_replaces_existing_row() {
        let store = SqliteRecordStore::new(setup_test_db());
        let pending = pending_at(t0());
        store.save_prediction(&pending).await.unwrap();

        let mut terminal = terminal_at(t0(), t0() + Duration::hours(2));
        terminal.id = pending.id.clone();
        store.save_prediction(&terminal).await.unwrap();

        let all = store
            .query_predictions(&PredictionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status(), Status::Win);
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = SqliteRecordStore::new(setup_test_db());
        let late = pending_at(t0() + Duration::hours(2));
        let early = pending_at(t0());
        let done = terminal_at(t0() + Duration::hours(1), t0() + Duration::hours(3));
        for p in [&late, &early, &done] {
            store.save_prediction(p).await.unwrap();
        }

        let pending = store
            .query_predictions(&PredictionFilter::pending())
            .await
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![early.id.clone(), late.id.clone()]);

        let validated = store
            .query_predictions(&PredictionFilter::validated_between(
                t0() + Duration::hours(3),
                t0() + Duration::hours(4),
            ))
            .await
            .unwrap();
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].id, done.id);

        let none = store
            .query_predictions(&PredictionFilter::validated_between(
                t0(),
                t0() + Duration::hours(3),
            ))
            .await
            .unwrap();
        assert!(none.is_empty());

        let limited = store
            .query_predictions(&PredictionFilter::default().with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, early.id);
    }

    #[tokio::test]
    async fn replace_buckets_overwrites_period() {
        let store = SqliteRecordStore::new(setup_test_db());
        let week: PeriodId = "2025-W20".parse().unwrap();
        let other: PeriodId = "2025-W21".parse().unwrap();

        store
            .replace_buckets(
                week,
                &[bucket(Dimension::Setup, "a", 1), bucket(Dimension::Setup, "b", 2)],
                t0(),
            )
            .await
            .unwrap();
        store
            .replace_buckets(other, &[bucket(Dimension::Setup, "z", 9)], t0())
            .await
            .unwrap();
        store
            .replace_buckets(week, &[bucket(Dimension::Confidence, "70-80", 3)], t0())
            .await
            .unwrap();

        let stored = store
            .query_buckets(&BucketFilter::for_period(week))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].bucket.value, "70-80");
        assert!(stored[0].bucket.calibration.as_ref().unwrap().warning);

        let all = store.query_buckets(&BucketFilter::default()).await.unwrap();
        let values: Vec<&str> = all.iter().map(|s| s.bucket.value.as_str()).collect();
        assert_eq!(values, vec!["70-80", "z"]);
    }

    #[tokio::test]
    async fn insight_insert_is_unique_per_period() {
        let store = SqliteRecordStore::new(setup_test_db());
        store.insert_insight(&insight("2025-W20", 1)).await.unwrap();
        store.insert_insight(&insight("2025-05", 2)).await.unwrap();

        let err = store.insert_insight(&insight("2025-W20", 3)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Invariant(InvariantError::InsightExists { .. })
        ));

        let latest = store.latest_insight().await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.period.to_string(), "2025-05");

        let history = store
            .query_insights(&InsightFilter::default())
            .await
            .unwrap();
        assert_eq!(
            history.iter().map(|r| r.version).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn query_insights_by_period_start() {
        let store = SqliteRecordStore::new(setup_test_db());
        for (i, period) in ["2025-W18", "2025-W19", "2025-W20"].iter().enumerate() {
            store
                .insert_insight(&insight(period, i as u64 + 1))
                .await
                .unwrap();
        }
        let w19: PeriodId = "2025-W19".parse().unwrap();
        let filter = InsightFilter {
            since: Some(w19.start()),
            ..InsightFilter::default()
        };
        let found = store.query_insights(&filter).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].period, w19);
    }

    #[tokio::test]
    async fn ping_succeeds() {
        let store = SqliteRecordStore::new(setup_test_db());
        assert!(store.ping().await.is_ok());
    }
}
