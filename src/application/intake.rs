//! Engine facade implementing the generator-facing port.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::application::persistence::Persistence;
use crate::domain::insight::InsightRecord;
use crate::domain::prediction::{Mode, Prediction};
use crate::error::Result;
use crate::port::inbound::intake::{PredictionIntake, PredictionRequest};

/// Accepts predictions from the generator and hands back insights.
#[derive(Clone)]
pub struct Engine {
    persistence: Persistence,
    mode: Mode,
}

impl Engine {
    /// New predictions are tagged with `mode`.
    #[must_use]
    pub const fn new(persistence: Persistence, mode: Mode) -> Self {
        Self { persistence, mode }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub const fn persistence(&self) -> &Persistence {
        &self.persistence
    }
}

#[async_trait]
impl PredictionIntake for Engine {
    async fn create_pending_prediction(&self, request: PredictionRequest) -> Result<Prediction> {
        let mut prediction = Prediction::try_new(
            self.mode,
            request.snapshot,
            request.targets,
            request.confidence,
            request.setup_tags,
            Utc::now(),
        )?;
        if let Some(hours) = request.max_holding_hours {
            prediction = prediction.with_max_holding_hours(hours);
        }

        self.persistence.save(&prediction).await?;
        info!(
            prediction = %prediction.id,
            symbol = %prediction.snapshot.symbol,
            direction = prediction.targets.direction().as_str(),
            confidence = prediction.confidence,
            setup = %prediction.setup_key(),
            mode = self.mode.as_str(),
            "Prediction recorded"
        );
        Ok(prediction)
    }

    async fn latest_insight(&self) -> Result<Option<InsightRecord>> {
        self.persistence.latest_insight().await
    }
}
