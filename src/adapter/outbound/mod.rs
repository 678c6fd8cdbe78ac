//! Outbound adapters (driven side).

pub mod coingecko;
pub mod file;
pub mod notifier;
pub mod sqlite;
