//! Core domain types.
//!
//! Nothing in here performs I/O. Predictions, periods, bucket statistics
//! and insight records are plain data with their invariants enforced by
//! constructors and lifecycle methods.

pub mod error;
pub mod id;
pub mod insight;
pub mod period;
pub mod prediction;
pub mod price;
pub mod stats;

pub use error::DomainError;
pub use id::{PredictionId, Symbol};
pub use insight::{Evidence, InsightRecord, ParameterSet, RankedBucket, SetupFlag};
pub use period::{PeriodId, PeriodKind};
pub use prediction::{
    Direction, Lifecycle, MarketSnapshot, Mode, Outcome, Prediction, SentimentRegime, Status,
    Targets, Verdict, VolatilityRegime,
};
pub use price::{PriceSample, PriceSeries};
pub use stats::{AggregateBucket, BucketStats, Calibration, Dimension};
