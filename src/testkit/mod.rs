//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] - Builders for predictions, outcomes, price series and insights.
//! - [`store`] - In-memory and failure-injecting record stores.
//! - [`market`] - Scripted [`MarketData`](crate::port::outbound::market_data::MarketData).
//! - [`notifier`] - A notifier that records every event.
//! - [`config`] - Canonical test configurations (fast retries, small thresholds).

pub mod config;
pub mod domain;
pub mod market;
pub mod notifier;
pub mod store;
