//! JSON file record store.
//!
//! Fallback backend used when the relational store cannot be reached at
//! startup. All tables live in a single JSON document that is rewritten
//! atomically on every change. Can also run purely in memory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::snapshot::write_atomic;
use crate::domain::id::PredictionId;
use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::prediction::Prediction;
use crate::domain::stats::AggregateBucket;
use crate::error::{Error, InvariantError, Result};
use crate::port::outbound::store::{
    BucketFilter, InsightFilter, PredictionFilter, RecordStore, StoredBucket,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeriodBuckets {
    computed_at: DateTime<Utc>,
    buckets: Vec<AggregateBucket>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    predictions: BTreeMap<String, Prediction>,
    #[serde(default)]
    aggregates: BTreeMap<PeriodId, PeriodBuckets>,
    #[serde(default)]
    insights: BTreeMap<PeriodId, InsightRecord>,
}

/// Record store backed by one JSON file.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Open (or create on first write) the store at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| Error::Parse(format!("{}: {e}", path.display())))?
            }
        } else {
            Tables::default()
        };

        debug!(
            path = %path.display(),
            predictions = tables.predictions.len(),
            "Opened JSON file store"
        );

        Ok(Self {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `change` to a copy of the tables, persist, then publish.
    ///
    /// The in-memory state only changes when the file write succeeded.
    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Tables) -> Result<()>,
    {
        let mut tables = self.tables.lock();
        let mut next = tables.clone();
        change(&mut next)?;

        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(&next)?;
            write_atomic(path, &json)?;
        }

        *tables = next;
        Ok(())
    }
}

fn creation_order(a: &Prediction, b: &Prediction) -> std::cmp::Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl RecordStore for JsonFileStore {
    fn backend_name(&self) -> &'static str {
        if self.path.is_some() {
            "json-file"
        } else {
            "memory"
        }
    }

    async fn save_prediction(&self, prediction: &Prediction) -> Result<()> {
        self.mutate(|tables| {
            tables
                .predictions
                .insert(prediction.id.to_string(), prediction.clone());
            Ok(())
        })
    }

    async fn get_prediction(&self, id: &PredictionId) -> Result<Option<Prediction>> {
        Ok(self.tables.lock().predictions.get(id.as_str()).cloned())
    }

    async fn query_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        let tables = self.tables.lock();
        let mut matched: Vec<Prediction> = tables
            .predictions
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matched.sort_by(creation_order);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn replace_buckets(
        &self,
        period: PeriodId,
        buckets: &[AggregateBucket],
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|tables| {
            tables.aggregates.insert(
                period,
                PeriodBuckets {
                    computed_at,
                    buckets: buckets.to_vec(),
                },
            );
            Ok(())
        })
    }

    async fn query_buckets(&self, filter: &BucketFilter) -> Result<Vec<StoredBucket>> {
        let tables = self.tables.lock();
        let mut matched: Vec<StoredBucket> = tables
            .aggregates
            .iter()
            .flat_map(|(period, stored)| {
                stored.buckets.iter().map(move |bucket| StoredBucket {
                    period: *period,
                    computed_at: stored.computed_at,
                    bucket: bucket.clone(),
                })
            })
            .filter(|stored| filter.matches(stored))
            .collect();
        matched.sort_by(|a, b| {
            a.period
                .start()
                .cmp(&b.period.start())
                .then_with(|| a.bucket.dimension.as_str().cmp(b.bucket.dimension.as_str()))
                .then_with(|| a.bucket.value.cmp(&b.bucket.value))
        });
        Ok(matched)
    }

    async fn insert_insight(&self, record: &InsightRecord) -> Result<()> {
        self.mutate(|tables| {
            if tables.insights.contains_key(&record.period) {
                return Err(InvariantError::InsightExists {
                    period: record.period.to_string(),
                }
                .into());
            }
            tables.insights.insert(record.period, record.clone());
            Ok(())
        })
    }

    async fn get_insight(&self, period: PeriodId) -> Result<Option<InsightRecord>> {
        Ok(self.tables.lock().insights.get(&period).cloned())
    }

    async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        Ok(self
            .tables
            .lock()
            .insights
            .values()
            .max_by_key(|r| r.version)
            .cloned())
    }

    async fn query_insights(&self, filter: &InsightFilter) -> Result<Vec<InsightRecord>> {
        let tables = self.tables.lock();
        let mut matched: Vec<InsightRecord> = tables
            .insights
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.version);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<()> {
        match &self.path {
            Some(path) => match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => Err(Error::Io(
                    std::io::Error::new(std::io::ErrorKind::NotFound, "store directory missing"),
                )),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }
}
