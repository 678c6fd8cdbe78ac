mod harness;

use chrono::{Duration, TimeZone, Utc};
use hindsight::application::scheduler::{SchedulerState, Trigger};
use hindsight::domain::period::PeriodId;
use hindsight::domain::prediction::{Status, Verdict};
use hindsight::testkit::domain::{pending_at, prices, t0, terminal_with};
use rust_decimal_macros::dec;
use tokio::sync::watch;

use harness::app::TestApp;

fn period(s: &str) -> PeriodId {
    s.parse().unwrap()
}

#[tokio::test]
async fn first_tick_after_week_end_evaluates_then_learns() {
    let t = TestApp::new();
    let pending = pending_at(t0());
    t.app.persistence.save(&pending).await.unwrap();
    t.market
        .set_series("BTC", prices(t0(), &[(0, dec!(100)), (45, dec!(110))]));
    for i in 0..5 {
        let created = t0() + Duration::hours(i);
        let trade = terminal_with(
            created,
            &["momentum"],
            0.7,
            Verdict::Win,
            2.0,
            created + Duration::hours(1),
        );
        t.app.persistence.save(&trade).await.unwrap();
    }
    let now = Utc.with_ymd_and_hms(2025, 5, 19, 0, 30, 0).unwrap();
    let (_tx, shutdown) = watch::channel(false);

    let report = t.app.scheduler.tick(now, &shutdown).await;

    assert_eq!(
        report.completed,
        vec![
            Trigger::Evaluate,
            Trigger::Learn(period("2025-W20")),
            Trigger::Learn(period("2025-04")),
        ]
    );
    assert!(report.failed.is_empty());
    assert_eq!(t.app.scheduler.state(), SchedulerState::Idle);

    let validated = t.app.persistence.get(&pending.id).await.unwrap().unwrap();
    assert_eq!(validated.status(), Status::Win);

    let week = t
        .app
        .persistence
        .get_insight(period("2025-W20"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(week.version, 1);
    assert_eq!(week.evidence.total_trades, 5);
    let month = t
        .app
        .persistence
        .get_insight(period("2025-04"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(month.version, 2);
    assert_eq!(month.evidence.total_trades, 0);
    assert_eq!(t.notifier.insights(), 2);
}

#[tokio::test]
async fn ticks_within_the_same_hour_do_nothing_new() {
    let t = TestApp::new();
    let now = Utc.with_ymd_and_hms(2025, 5, 19, 0, 30, 0).unwrap();
    let (_tx, shutdown) = watch::channel(false);

    let first = t.app.scheduler.tick(now, &shutdown).await;
    let second = t
        .app
        .scheduler
        .tick(now + Duration::minutes(10), &shutdown)
        .await;
    let next_hour = t
        .app
        .scheduler
        .tick(now + Duration::minutes(40), &shutdown)
        .await;

    assert_eq!(first.completed.len(), 3);
    assert!(second.completed.is_empty());
    assert_eq!(next_hour.completed, vec![Trigger::Evaluate]);
}

#[tokio::test]
async fn tick_while_busy_defers_until_idle() {
    let t = TestApp::new();
    let now = Utc.with_ymd_and_hms(2025, 5, 19, 0, 30, 0).unwrap();
    let (_tx, shutdown) = watch::channel(false);

    let guard = t.app.scheduler.begin(SchedulerState::Evaluating).unwrap();
    let busy = t.app.scheduler.tick(now, &shutdown).await;
    assert!(busy.completed.is_empty());
    assert_eq!(busy.deferred, 3);
    drop(guard);

    let idle = t
        .app
        .scheduler
        .tick(now + Duration::minutes(1), &shutdown)
        .await;
    assert_eq!(idle.completed.len(), 3);
    assert!(t.app.scheduler.pending().is_empty());
}

#[tokio::test]
async fn weekly_learning_can_be_disabled() {
    let t = TestApp::with_config(|config| config.schedule.weekly = false);
    let now = Utc.with_ymd_and_hms(2025, 5, 19, 0, 30, 0).unwrap();
    let (_tx, shutdown) = watch::channel(false);

    let report = t.app.scheduler.tick(now, &shutdown).await;

    assert_eq!(
        report.completed,
        vec![Trigger::Evaluate, Trigger::Learn(period("2025-04"))]
    );
}
