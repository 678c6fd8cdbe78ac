//! Hindsight - prediction validation and adaptive learning.
//!
//! A prediction generator hands this crate pending trade predictions
//! (entry, targets, stop, confidence, setup tags). Hindsight replays
//! historical prices to decide each prediction's outcome, aggregates the
//! outcomes per setup, hour, direction and market regime, and publishes a
//! versioned insight record with bounded parameter adjustments the
//! generator reads back.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - [`domain`] - Predictions, periods, bucket statistics, insight records
//! - [`port`] - Traits for storage, market data, notifications and intake
//! - [`application`] - Evaluator, aggregator, synthesizer, persistence,
//!   validation and learning services, scheduler
//! - [`adapter`] - SQLite and JSON-file stores, CoinGecko, Telegram, CLI
//! - [`infrastructure`] - Configuration, wiring and the runtime loop
//!
//! # Features
//!
//! - `telegram` (default) - Telegram notifications via teloxide
//! - `testkit` - Test builders and in-memory fakes for integration tests
//!
//! # Example
//!
//! ```no_run
//! use hindsight::infrastructure::bootstrap::App;
//! use hindsight::infrastructure::config::settings::Config;
//! use hindsight::port::{PredictionIntake, PredictionRequest};
//!
//! # async fn demo(request: PredictionRequest) -> hindsight::error::Result<()> {
//! let app = App::build(Config::load("hindsight.toml")?)?;
//! let pending = app.engine.create_pending_prediction(request).await?;
//! let latest = app.engine.latest_insight().await?;
//! # let _ = (pending, latest);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
