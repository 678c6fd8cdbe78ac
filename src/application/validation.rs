//! Hourly validation pass over pending predictions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::evaluator::{Evaluation, OutcomeEvaluator};
use crate::application::persistence::Persistence;
use crate::domain::prediction::Prediction;
use crate::error::{Error, Result};
use crate::port::outbound::market_data::MarketData;
use crate::port::outbound::notifier::{Event, Notifier};
use crate::port::outbound::store::PredictionFilter;

/// Counters for one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Pending predictions looked at.
    pub examined: usize,
    /// Predictions that reached a verdict and were persisted.
    pub finalized: usize,
    /// Predictions whose holding window is still open.
    pub still_open: usize,
    /// Predictions left pending because of data problems or a lost race.
    pub skipped: usize,
    /// Shutdown was requested before every prediction was examined.
    pub cancelled: bool,
}

/// Evaluates every pending prediction and persists the verdicts.
pub struct ValidationService {
    persistence: Persistence,
    market: Arc<dyn MarketData>,
    evaluator: OutcomeEvaluator,
    notifier: Arc<dyn Notifier>,
}

impl ValidationService {
    #[must_use]
    pub fn new(
        persistence: Persistence,
        market: Arc<dyn MarketData>,
        evaluator: OutcomeEvaluator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            persistence,
            market,
            evaluator,
            notifier,
        }
    }

    #[must_use]
    pub const fn evaluator(&self) -> &OutcomeEvaluator {
        &self.evaluator
    }

    /// Run one pass as seen at `as_of`.
    ///
    /// Predictions are processed oldest first. Shutdown is checked between
    /// predictions, never during a write. Data errors leave the prediction
    /// pending; storage errors end the pass.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure.
    pub async fn run_pass(
        &self,
        as_of: DateTime<Utc>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<ValidationReport> {
        let pending = self.persistence.query(&PredictionFilter::pending()).await?;
        let mut report = ValidationReport::default();

        debug!(pending = pending.len(), as_of = %as_of, "Starting validation pass");

        for prediction in pending {
            if *shutdown.borrow() {
                report.cancelled = true;
                info!(examined = report.examined, "Validation pass cancelled");
                break;
            }
            report.examined += 1;

            if prediction.created_at > as_of {
                report.still_open += 1;
                continue;
            }

            match self.validate(&prediction, as_of).await? {
                Step::Finalized => report.finalized += 1,
                Step::Open => report.still_open += 1,
                Step::Skipped => report.skipped += 1,
            }
        }

        info!(
            examined = report.examined,
            finalized = report.finalized,
            open = report.still_open,
            skipped = report.skipped,
            "Validation pass complete"
        );
        Ok(report)
    }

    async fn validate(&self, prediction: &Prediction, as_of: DateTime<Utc>) -> Result<Step> {
        let deadline = prediction.deadline(self.evaluator.max_holding_hours());
        let since = prediction.created_at - self.evaluator.coverage_tolerance();
        let until = deadline.min(as_of);
        let symbol = &prediction.snapshot.symbol;

        let series = match self.market.price_series(symbol, since, until).await {
            Ok(series) => series,
            Err(e) if e.is_storage() => return Err(e),
            Err(e) => {
                warn!(
                    prediction = %prediction.id,
                    symbol = %symbol,
                    provider = self.market.provider_name(),
                    error = %e,
                    "Price data unavailable, prediction stays pending"
                );
                return Ok(Step::Skipped);
            }
        };

        let outcome = match self.evaluator.evaluate(prediction, &series, as_of) {
            Ok(Evaluation::Finalized(outcome)) => outcome,
            Ok(Evaluation::Open) => return Ok(Step::Open),
            Ok(Evaluation::AlreadyFinal(_)) => return Ok(Step::Skipped),
            Err(e) => {
                warn!(
                    prediction = %prediction.id,
                    symbol = %symbol,
                    samples = series.len(),
                    error = %e,
                    "Cannot evaluate, prediction stays pending"
                );
                return Ok(Step::Skipped);
            }
        };

        match self.persistence.record_outcome(&prediction.id, outcome).await {
            Ok(updated) => {
                if let Some(outcome) = updated.outcome() {
                    info!(
                        prediction = %updated.id,
                        symbol = %symbol,
                        verdict = %updated.status(),
                        r = outcome.realized_r,
                        exit = %outcome.exit_price,
                        "Prediction validated"
                    );
                }
                self.notifier
                    .notify(Event::ValidationComplete(Box::new(updated)));
                Ok(Step::Finalized)
            }
            Err(Error::Invariant(e)) => {
                warn!(prediction = %prediction.id, error = %e, "Outcome rejected");
                Ok(Step::Skipped)
            }
            Err(e) => Err(e),
        }
    }
}

enum Step {
    Finalized,
    Open,
    Skipped,
}
