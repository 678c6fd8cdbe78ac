//! Contract between the external prediction generator and the engine.
//!
//! The generator writes pending predictions in and reads the latest
//! insight back on its next invocation. Whether the generator has enough
//! history to trust an insight is its own decision.

use async_trait::async_trait;

use crate::domain::insight::InsightRecord;
use crate::domain::prediction::{MarketSnapshot, Prediction, Targets};
use crate::error::Result;

/// A prediction as submitted by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub snapshot: MarketSnapshot,
    pub targets: Targets,
    pub confidence: f64,
    pub setup_tags: Vec<String>,
    pub max_holding_hours: Option<u32>,
}

impl PredictionRequest {
    #[must_use]
    pub fn new(
        snapshot: MarketSnapshot,
        targets: Targets,
        confidence: f64,
        setup_tags: Vec<String>,
    ) -> Self {
        Self {
            snapshot,
            targets,
            confidence,
            setup_tags,
            max_holding_hours: None,
        }
    }

    #[must_use]
    pub const fn with_max_holding_hours(mut self, hours: u32) -> Self {
        self.max_holding_hours = Some(hours);
        self
    }
}

/// Inbound port used by the prediction generator.
#[async_trait]
pub trait PredictionIntake: Send + Sync {
    /// Validate and persist a new pending prediction.
    async fn create_pending_prediction(&self, request: PredictionRequest) -> Result<Prediction>;

    /// The most recent insight, if any learning cycle has completed.
    async fn latest_insight(&self) -> Result<Option<InsightRecord>>;
}
