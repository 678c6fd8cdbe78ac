use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::prediction::Status;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Durable storage failures. Fatal to the current run, retried next tick.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },

    #[error("prediction not found: {id}")]
    NotFound { id: String },

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Market data problems. The affected prediction stays pending.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("market data unavailable for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },

    #[error("insufficient price data: {reason}")]
    Insufficient { reason: String },
}

/// Rejected attempts to break record immutability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("prediction {id} is already {from}, cannot move to {to}")]
    IllegalTransition { id: String, from: Status, to: Status },

    #[error("insight for period {period} already exists")]
    InsightExists { period: String },

    #[error("period {period} is still open until {ends_at}")]
    PeriodOpen { period: String, ends_at: DateTime<Utc> },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Invariant violations are rejections, not transient failures.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Storage failures end the current run.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Database(_) | Self::Connection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
