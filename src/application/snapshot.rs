//! Human-readable learning snapshot.
//!
//! Writes a JSON file with the latest aggregates and insight so operators
//! can inspect what the engine learned without querying the store. The file
//! is independent of which backend is active.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::insight::InsightRecord;
use crate::domain::period::PeriodId;
use crate::domain::stats::AggregateBucket;
use crate::error::Result;

/// Current snapshot file format version.
const SNAPSHOT_VERSION: &str = "1";

/// File name used inside the snapshot directory.
pub const SNAPSHOT_FILE: &str = "learning_snapshot.json";

/// Top-level snapshot file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSnapshot {
    /// Schema version for forward compatibility.
    pub version: String,
    /// Active storage backend.
    pub backend: String,
    /// Most recently aggregated period.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregated_period: Option<PeriodId>,
    pub buckets: Vec<AggregateBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_insight: Option<InsightRecord>,
    pub updated_at: DateTime<Utc>,
}

/// Writer for the snapshot file.
///
/// Keeps the last written state so aggregate and insight updates each
/// rewrite the whole file.
pub struct SnapshotWriter {
    path: PathBuf,
    snapshot: Mutex<LearningSnapshot>,
}

impl SnapshotWriter {
    #[must_use]
    pub fn new(path: PathBuf, backend: &str) -> Self {
        let snapshot = LearningSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            backend: backend.to_string(),
            aggregated_period: None,
            buckets: Vec::new(),
            latest_insight: None,
            updated_at: Utc::now(),
        };
        Self {
            path,
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Snapshot file inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path, backend: &str) -> Self {
        Self::new(dir.join(SNAPSHOT_FILE), backend)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record freshly computed buckets and rewrite the file.
    pub fn record_buckets(&self, period: PeriodId, buckets: &[AggregateBucket]) -> Result<()> {
        {
            let mut snapshot = self.snapshot.lock();
            snapshot.aggregated_period = Some(period);
            snapshot.buckets = buckets.to_vec();
        }
        self.write()
    }

    /// Record a new insight and rewrite the file.
    pub fn record_insight(&self, record: &InsightRecord) -> Result<()> {
        self.snapshot.lock().latest_insight = Some(record.clone());
        self.write()
    }

    /// Write the current snapshot to the file atomically.
    ///
    /// Uses write-to-temp-then-rename. Creates the parent directory if it
    /// doesn't exist.
    pub fn write(&self) -> Result<()> {
        // Serialize while holding the lock, release before I/O
        let json = {
            let mut snapshot = self.snapshot.lock();
            snapshot.updated_at = Utc::now();
            serde_json::to_string_pretty(&*snapshot)?
        };

        write_atomic(&self.path, json.as_bytes())
    }
}

/// Replace `path` with `bytes` via a synced temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;

    let cleanup_and_err = |e| {
        let _ = fs::remove_file(&temp_path);
        e
    };

    file.write_all(bytes).map_err(cleanup_and_err)?;
    file.sync_all().map_err(cleanup_and_err)?;
    fs::rename(&temp_path, path).map_err(cleanup_and_err)?;

    Ok(())
}
