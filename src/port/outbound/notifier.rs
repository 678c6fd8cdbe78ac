//! Notifier port for event notifications.
//!
//! This module defines the trait for sending notifications about engine
//! events: validated predictions, new insights and degraded runs.

use std::fmt;

use crate::domain::insight::InsightRecord;
use crate::domain::prediction::Prediction;

/// Pipeline stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Evaluation,
    Aggregation,
    Synthesis,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Aggregation => "aggregation",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone)]
pub enum Event {
    /// A prediction reached a terminal status.
    ValidationComplete(Box<Prediction>),
    /// A learning cycle produced a new insight.
    InsightReady(Box<InsightRecord>),
    /// A scheduled run failed.
    Degraded {
        /// The stage that failed.
        stage: Stage,
        /// Error description.
        reason: String,
    },
}

/// Trait for notification handlers.
///
/// Notifications are fire-and-forget. The `notify` method should return
/// quickly; implementations doing network I/O hand the event to a worker.
pub trait Notifier: Send + Sync {
    /// Handle an event.
    fn notify(&self, event: Event);
}

/// Registry of notifiers (composite pattern).
///
/// Broadcasts events to all registered notifiers.
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { notifiers: vec![] }
    }

    /// Register a notifier.
    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Notify all registered notifiers.
    pub fn notify_all(&self, event: Event) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotifierRegistry {
    fn notify(&self, event: Event) {
        self.notify_all(event);
    }
}

/// A logging notifier that logs events via tracing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        use tracing::{info, warn};
        match event {
            Event::ValidationComplete(prediction) => {
                let r = prediction.outcome().map_or(0.0, |o| o.realized_r);
                info!(
                    prediction = %prediction.id,
                    symbol = %prediction.snapshot.symbol,
                    status = %prediction.status(),
                    r = r,
                    "Prediction validated"
                );
            }
            Event::InsightReady(record) => {
                info!(
                    period = %record.period,
                    version = record.version,
                    deltas = record.deltas.len(),
                    trades = record.evidence.total_trades,
                    "Insight ready"
                );
            }
            Event::Degraded { stage, reason } => {
                warn!(stage = %stage, reason = %reason, "Run degraded");
            }
        }
    }
}
