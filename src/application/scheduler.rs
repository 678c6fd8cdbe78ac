//! Time-driven scheduling of validation and learning runs.
//!
//! One workflow runs at a time. Triggers that arrive while another run is
//! active are queued (without duplicates) and picked up on a later tick.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::application::learning::LearningService;
use crate::application::validation::ValidationService;
use crate::domain::period::{PeriodId, PeriodKind};
use crate::error::Error;
use crate::port::outbound::notifier::{Event, Notifier, Stage};

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Evaluating,
    Aggregating,
    Synthesizing,
}

impl SchedulerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Aggregating => "aggregating",
            Self::Synthesizing => "synthesizing",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Validate pending predictions.
    Evaluate,
    /// Aggregate and synthesize a completed period.
    Learn(PeriodId),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluate => f.write_str("evaluate"),
            Self::Learn(period) => write!(f, "learn {period}"),
        }
    }
}

/// Which periodic triggers are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub weekly: bool,
    pub monthly: bool,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            weekly: true,
            monthly: true,
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Triggers that ran to completion.
    pub completed: Vec<Trigger>,
    /// Triggers that failed and were requeued.
    pub failed: Vec<Trigger>,
    /// Triggers still waiting because another run was active.
    pub deferred: usize,
}

/// Holds the scheduler out of `Idle`; dropping it returns to `Idle`.
pub struct StateGuard {
    state: Arc<Mutex<SchedulerState>>,
}

impl StateGuard {
    /// Move to another active state without releasing the slot.
    pub fn transition(&self, next: SchedulerState) {
        *self.state.lock() = next;
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        *self.state.lock() = SchedulerState::Idle;
    }
}

#[derive(Debug, Default)]
struct Marks {
    hour: Option<DateTime<Utc>>,
    week: Option<PeriodId>,
    month: Option<PeriodId>,
}

/// Drives evaluation and learning from wall-clock ticks.
pub struct Scheduler {
    validation: ValidationService,
    learning: LearningService,
    notifier: Arc<dyn Notifier>,
    cadence: Cadence,
    state: Arc<Mutex<SchedulerState>>,
    queue: Mutex<VecDeque<Trigger>>,
    marks: Mutex<Marks>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        validation: ValidationService,
        learning: LearningService,
        notifier: Arc<dyn Notifier>,
        cadence: Cadence,
    ) -> Self {
        Self {
            validation,
            learning,
            notifier,
            cadence,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
            queue: Mutex::new(VecDeque::new()),
            marks: Mutex::new(Marks::default()),
        }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    #[must_use]
    pub const fn validation(&self) -> &ValidationService {
        &self.validation
    }

    #[must_use]
    pub const fn learning(&self) -> &LearningService {
        &self.learning
    }

    /// Claim the single active slot, or `None` when something else runs.
    pub fn begin(&self, state: SchedulerState) -> Option<StateGuard> {
        let mut current = self.state.lock();
        if *current != SchedulerState::Idle {
            return None;
        }
        *current = state;
        Some(StateGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Queue `trigger` unless an identical one is already waiting.
    pub fn enqueue(&self, trigger: Trigger) -> bool {
        let mut queue = self.queue.lock();
        if queue.contains(&trigger) {
            return false;
        }
        queue.push_back(trigger);
        true
    }

    /// Waiting triggers, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<Trigger> {
        self.queue.lock().iter().copied().collect()
    }

    /// Queue the triggers that became due at `now`.
    ///
    /// A new UTC hour queues an evaluation; a newly completed ISO week or
    /// calendar month queues learning for that period.
    pub fn schedule_due(&self, now: DateTime<Utc>) {
        let hour = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
        let mut due = Vec::new();
        {
            let mut marks = self.marks.lock();
            if marks.hour != Some(hour) {
                marks.hour = Some(hour);
                due.push(Trigger::Evaluate);
            }
            if self.cadence.weekly {
                let week = PeriodId::last_completed(now, PeriodKind::Weekly);
                if marks.week != Some(week) {
                    marks.week = Some(week);
                    due.push(Trigger::Learn(week));
                }
            }
            if self.cadence.monthly {
                let month = PeriodId::last_completed(now, PeriodKind::Monthly);
                if marks.month != Some(month) {
                    marks.month = Some(month);
                    due.push(Trigger::Learn(month));
                }
            }
        }
        for trigger in due {
            if self.enqueue(trigger) {
                debug!(trigger = %trigger, "Trigger queued");
            }
        }
    }

    /// Queue due triggers, then drain the queue if nothing else is running.
    ///
    /// Failed triggers go back on the queue for the next tick.
    pub async fn tick(&self, now: DateTime<Utc>, shutdown: &watch::Receiver<bool>) -> TickReport {
        self.schedule_due(now);
        let mut report = TickReport::default();

        if self.state() != SchedulerState::Idle {
            report.deferred = self.queue.lock().len();
            debug!(state = %self.state(), deferred = report.deferred, "Busy, deferring");
            return report;
        }

        loop {
            if *shutdown.borrow() {
                break;
            }
            let Some(trigger) = self.queue.lock().pop_front() else {
                break;
            };
            match self.run(trigger, now, shutdown).await {
                RunResult::Done => report.completed.push(trigger),
                RunResult::Busy => {
                    self.queue.lock().push_front(trigger);
                    break;
                }
                RunResult::Failed => report.failed.push(trigger),
            }
        }

        for trigger in &report.failed {
            self.enqueue(*trigger);
        }
        report.deferred = self.queue.lock().len().saturating_sub(report.failed.len());
        report
    }

    /// Run one trigger now, respecting the single active slot.
    async fn run(
        &self,
        trigger: Trigger,
        now: DateTime<Utc>,
        shutdown: &watch::Receiver<bool>,
    ) -> RunResult {
        match trigger {
            Trigger::Evaluate => {
                let Some(_guard) = self.begin(SchedulerState::Evaluating) else {
                    return RunResult::Busy;
                };
                match self.validation.run_pass(now, shutdown).await {
                    Ok(_) => RunResult::Done,
                    Err(e) => self.degrade(Stage::Evaluation, &e),
                }
            }
            Trigger::Learn(period) => {
                let Some(guard) = self.begin(SchedulerState::Aggregating) else {
                    return RunResult::Busy;
                };
                match self.learning.is_learned(period).await {
                    Ok(true) => {
                        debug!(period = %period, "Insight exists, skipping");
                        return RunResult::Done;
                    }
                    Ok(false) => {}
                    Err(e) => return self.degrade(Stage::Aggregation, &e),
                }

                let buckets = match self.learning.aggregate(period, now).await {
                    Ok(buckets) => buckets,
                    Err(e) => return self.degrade(Stage::Aggregation, &e),
                };

                guard.transition(SchedulerState::Synthesizing);
                match self.learning.synthesize(period, &buckets, now).await {
                    Ok(record) => {
                        info!(period = %period, version = record.version, "Learning cycle complete");
                        RunResult::Done
                    }
                    Err(e) if e.is_invariant() => {
                        debug!(period = %period, error = %e, "Insight appeared concurrently");
                        RunResult::Done
                    }
                    Err(e) => self.degrade(Stage::Synthesis, &e),
                }
            }
        }
    }

    fn degrade(&self, stage: Stage, err: &Error) -> RunResult {
        error!(stage = %stage, error = %err, "Scheduled run failed");
        self.notifier.notify(Event::Degraded {
            stage,
            reason: err.to_string(),
        });
        RunResult::Failed
    }
}

enum RunResult {
    Done,
    Busy,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregator::PerformanceAggregator;
    use crate::application::evaluator::OutcomeEvaluator;
    use crate::application::persistence::{Backend, Persistence};
    use crate::application::synthesizer::InsightSynthesizer;
    use crate::port::outbound::store::RecordStore;
    use crate::testkit::config::fast_retry;
    use crate::testkit::domain::{pending_at, t0};
    use crate::testkit::market::ScriptedMarketData;
    use crate::testkit::notifier::RecordingNotifier;
    use crate::testkit::store::{FailingStore, MemoryStore};
    use chrono::TimeZone;

    fn scheduler(store: Arc<dyn RecordStore>, notifier: &RecordingNotifier) -> Scheduler {
        let persistence = Persistence::new(store, Backend::Primary, fast_retry());
        let notifier: Arc<dyn Notifier> = Arc::new(notifier.clone());
        let validation = ValidationService::new(
            persistence.clone(),
            Arc::new(ScriptedMarketData::new()),
            OutcomeEvaluator::default(),
            notifier.clone(),
        );
        let learning = LearningService::new(
            persistence,
            PerformanceAggregator::default(),
            InsightSynthesizer::default(),
            notifier.clone(),
        );
        Scheduler::new(validation, learning, notifier, Cadence::default())
    }

    fn running() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[test]
    fn queue_deduplicates() {
        let s = scheduler(Arc::new(MemoryStore::new()), &RecordingNotifier::new());
        assert!(s.enqueue(Trigger::Evaluate));
        assert!(!s.enqueue(Trigger::Evaluate));
        assert_eq!(s.pending(), vec![Trigger::Evaluate]);
    }

    #[test]
    fn due_triggers_fire_once_per_boundary() {
        let s = scheduler(Arc::new(MemoryStore::new()), &RecordingNotifier::new());
        s.schedule_due(t0());
        assert_eq!(
            s.pending(),
            vec![
                Trigger::Evaluate,
                Trigger::Learn("2025-W19".parse().unwrap()),
                Trigger::Learn("2025-04".parse().unwrap()),
            ]
        );

        s.queue.lock().clear();
        s.schedule_due(t0() + Duration::minutes(30));
        assert!(s.pending().is_empty());

        s.schedule_due(t0() + Duration::hours(1));
        assert_eq!(s.pending(), vec![Trigger::Evaluate]);
    }

    #[test]
    fn guard_returns_to_idle_on_drop() {
        let s = scheduler(Arc::new(MemoryStore::new()), &RecordingNotifier::new());
        {
            let guard = s.begin(SchedulerState::Aggregating).unwrap();
            assert!(s.begin(SchedulerState::Evaluating).is_none());
            guard.transition(SchedulerState::Synthesizing);
            assert_eq!(s.state(), SchedulerState::Synthesizing);
        }
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn busy_scheduler_defers_triggers() {
        let notifier = RecordingNotifier::new();
        let s = scheduler(Arc::new(MemoryStore::new()), &notifier);

        let guard = s.begin(SchedulerState::Evaluating).unwrap();
        let report = s.tick(t0(), &running()).await;
        assert!(report.completed.is_empty());
        assert_eq!(report.deferred, 3);
        drop(guard);

        let report = s.tick(t0() + Duration::minutes(1), &running()).await;
        assert_eq!(report.completed.len(), 3);
        assert!(s.pending().is_empty());
        assert_eq!(notifier.insights(), 2);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn learned_period_is_not_relearned() {
        let notifier = RecordingNotifier::new();
        let s = scheduler(Arc::new(MemoryStore::new()), &notifier);
        let week: PeriodId = "2025-W19".parse().unwrap();

        s.tick(t0(), &running()).await;
        s.enqueue(Trigger::Learn(week));
        let report = s.tick(t0() + Duration::minutes(1), &running()).await;

        assert_eq!(report.completed, vec![Trigger::Learn(week)]);
        assert_eq!(notifier.insights(), 2);
    }

    #[tokio::test]
    async fn failure_emits_degraded_and_requeues() {
        let notifier = RecordingNotifier::new();
        let store = Arc::new(FailingStore::failing_writes(0));
        let s = scheduler(store.clone(), &notifier);
        store.fail_next(u32::MAX);

        let now = Utc.with_ymd_and_hms(2025, 5, 12, 8, 30, 0).unwrap();
        let report = s.tick(now, &running()).await;

        assert_eq!(report.completed, vec![Trigger::Evaluate]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(notifier.degraded(), 2);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.pending().len(), 2);

        store.fail_next(0);
        let report = s.tick(now + Duration::minutes(1), &running()).await;
        assert_eq!(report.completed.len(), 2);
        assert_eq!(notifier.insights(), 2);
    }

    #[tokio::test]
    async fn evaluation_runs_before_learning() {
        let notifier = RecordingNotifier::new();
        let store = Arc::new(MemoryStore::new());
        let s = scheduler(store.clone(), &notifier);
        store.save_prediction(&pending_at(t0())).await.unwrap();

        let report = s.tick(t0() + Duration::days(2), &running()).await;
        assert_eq!(report.completed[0], Trigger::Evaluate);
    }

    #[tokio::test]
    async fn shutdown_leaves_queue_intact() {
        let s = scheduler(Arc::new(MemoryStore::new()), &RecordingNotifier::new());
        let (_tx, rx) = watch::channel(true);
        let report = s.tick(t0(), &rx).await;
        assert!(report.completed.is_empty());
        assert_eq!(s.pending().len(), 3);
    }
}
