//! SQLite persistence adapter.
//!
//! Primary [`RecordStore`](crate::port::outbound::store::RecordStore)
//! implementation using Diesel ORM with an r2d2 pool and embedded
//! migrations.

pub mod database;
pub mod store;

pub use store::SqliteRecordStore;
