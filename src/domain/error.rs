//! Domain validation errors for core domain types.
//!
//! This module defines errors that occur when domain invariants are violated.
//! These errors are returned by `try_new` constructors that validate inputs
//! and by lifecycle transitions on prediction records.
//!
//! # Examples
//!
//! ```
//! use hindsight::domain::error::DomainError;
//! use hindsight::domain::prediction::{Direction, Targets};
//! use rust_decimal_macros::dec;
//!
//! // A long stop-loss above entry is rejected
//! let result = Targets::try_new(Direction::Long, dec!(100), vec![dec!(110)], dec!(105));
//!
//! assert!(matches!(result, Err(DomainError::StopOnWrongSide { .. })));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use super::prediction::Status;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A prediction needs at least one take-profit level.
    #[error("take-profit levels cannot be empty")]
    EmptyTakeProfits,

    /// The stop-loss must sit on the losing side of entry.
    #[error("stop-loss {stop} is on the wrong side of entry {entry}")]
    StopOnWrongSide {
        /// Entry price.
        entry: Decimal,
        /// Offending stop-loss level.
        stop: Decimal,
    },

    /// Every take-profit must sit on the winning side of entry.
    #[error("take-profit {target} is on the wrong side of entry {entry}")]
    TargetOnWrongSide {
        /// Entry price.
        entry: Decimal,
        /// Offending take-profit level.
        target: Decimal,
    },

    /// Prices must be strictly positive.
    #[error("price must be positive, got {price}")]
    NonPositivePrice {
        /// The invalid price.
        price: Decimal,
    },

    /// Confidence is a probability.
    #[error("confidence must be within [0, 1], got {confidence}")]
    ConfidenceOutOfRange {
        /// The invalid confidence.
        confidence: f64,
    },

    /// A terminal record can never transition again.
    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: Status,
        /// Requested status.
        to: Status,
    },

    /// Unknown lifecycle status name.
    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    /// Unparseable period identifier.
    #[error("invalid period identifier '{0}'")]
    InvalidPeriod(String),
}
