//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and the startup probe
//! that decides whether the relational store is usable.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{Error, Result};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Default time to wait for a pooled connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct BusyTimeout;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA busy_timeout=5000")
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Create a connection pool for the given database URL.
///
/// Pool construction blocks until a connection is established or
/// `connection_timeout` elapses.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str, connection_timeout: Duration) -> Result<DbPool> {
    // Each in-memory connection is its own database.
    let max_size = if database_url.contains(":memory:") { 1 } else { 5 };

    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .connection_timeout(connection_timeout)
        .connection_customizer(Box::new(BusyTimeout))
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Connection(e.to_string()))?;
    Ok(())
}

/// Round-trip a trivial query.
///
/// # Errors
/// Returns an error if no connection is available or the query fails.
pub fn ping(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(())
}

/// Open the pool, migrate and ping: the startup check for the primary store.
///
/// # Errors
/// Returns the first failure of the three steps.
pub fn probe(database_url: &str, connection_timeout: Duration) -> Result<DbPool> {
    let pool = create_pool(database_url, connection_timeout)?;
    run_migrations(&pool)?;
    ping(&pool)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(diesel::QueryableByName)]
    struct TableName {
        #[diesel(sql_type = diesel::sql_types::Text)]
        name: String,
    }

    #[test]
    fn create_pool_with_memory_db() {
        let pool = create_pool(":memory:", DEFAULT_CONNECTION_TIMEOUT);
        assert!(pool.is_ok());
    }

    #[test]
    fn run_migrations_creates_tables() {
        let pool = create_pool(":memory:", DEFAULT_CONNECTION_TIMEOUT).unwrap();
        run_migrations(&pool).unwrap();

        let mut conn = pool.get().unwrap();
        let result: Vec<String> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '__diesel_schema_migrations' ORDER BY name",
        )
        .load::<TableName>(&mut conn)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();

        assert_eq!(result, vec!["aggregates", "insights", "predictions"]);
    }

    #[test]
    fn run_migrations_is_idempotent() {
        let pool = create_pool(":memory:", DEFAULT_CONNECTION_TIMEOUT).unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();
        assert!(ping(&pool).is_ok());
    }

    #[test]
    fn probe_succeeds_on_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("probe.db").display().to_string();
        assert!(probe(&url, DEFAULT_CONNECTION_TIMEOUT).is_ok());
    }

    #[test]
    fn probe_fails_for_unreachable_location() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir
            .path()
            .join("missing/dir/probe.db")
            .display()
            .to_string();
        let result = probe(&url, Duration::from_millis(200));
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
