use std::path::{Path, PathBuf};
use std::sync::Arc;

use diesel::prelude::*;
use hindsight::adapter::outbound::sqlite::database::connection::{probe, DbPool};
use hindsight::adapter::outbound::sqlite::SqliteRecordStore;
use hindsight::port::RecordStore;
use tempfile::TempDir;

/// Temporary SQLite database for integration tests, removed on drop.
pub struct TempDb {
    dir: TempDir,
    url: String,
    pool: DbPool,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = dir
            .path()
            .join(format!("hindsight-{name}.db"))
            .display()
            .to_string();
        let pool = probe(&url, std::time::Duration::from_secs(2)).expect("open sqlite pool");

        // WAL mode improves concurrent writer behavior in tests.
        {
            let mut conn = pool.get().expect("get sqlite connection");
            diesel::sql_query("PRAGMA journal_mode=WAL")
                .execute(&mut conn)
                .expect("enable WAL mode");
        }

        Self { dir, url, pool }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.url)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::new(SqliteRecordStore::new(self.pool.clone()))
    }
}
