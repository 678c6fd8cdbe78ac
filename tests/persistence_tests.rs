mod harness;

use std::sync::Arc;

use hindsight::application::persistence::{Backend, Persistence};
use hindsight::application::snapshot::{LearningSnapshot, SNAPSHOT_FILE};
use hindsight::error::{Error, InvariantError, PersistenceError};
use hindsight::infrastructure::orchestration::health::health_check;
use hindsight::port::{PredictionFilter, RecordStore};
use hindsight::testkit::config::fast_retry;
use hindsight::domain::prediction::{Status, Verdict};
use hindsight::testkit::domain::{
    insight, outcome, pending_at, pending_prediction, t0, win_outcome,
};
use hindsight::testkit::store::FailingStore;

use harness::app::TestApp;
use harness::temp_db::TempDb;

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let db = TempDb::create("reopen");
    let prediction = pending_prediction();
    {
        let persistence = Persistence::new(db.store(), Backend::Primary, fast_retry());
        persistence.save(&prediction).await.unwrap();
        persistence
            .record_outcome(&prediction.id, win_outcome())
            .await
            .unwrap();
    }

    let reopened = Persistence::new(db.store(), Backend::Primary, fast_retry());
    let stored = reopened.get(&prediction.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome(), Some(&win_outcome()));
    assert!(reopened
        .query(&PredictionFilter::pending())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn second_outcome_is_rejected_as_illegal_transition() {
    let db = TempDb::create("transition");
    let persistence = Persistence::new(db.store(), Backend::Primary, fast_retry());
    let prediction = pending_prediction();
    persistence.save(&prediction).await.unwrap();
    persistence
        .record_outcome(&prediction.id, win_outcome())
        .await
        .unwrap();

    let err = persistence
        .record_outcome(&prediction.id, win_outcome())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Invariant(InvariantError::IllegalTransition { .. })
    ));
}

#[tokio::test]
async fn stale_pending_copy_cannot_reopen_a_terminal_record() {
    let db = TempDb::create("stale-pending");
    let persistence = Persistence::new(db.store(), Backend::Primary, fast_retry());
    let prediction = pending_prediction();
    persistence.save(&prediction).await.unwrap();
    persistence
        .record_outcome(&prediction.id, win_outcome())
        .await
        .unwrap();

    let err = persistence.save(&prediction).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Invariant(InvariantError::IllegalTransition {
            from: Status::Win,
            to: Status::Pending,
            ..
        })
    ));
    let stored = persistence.get(&prediction.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), Status::Win);
}

#[tokio::test]
async fn terminal_record_cannot_be_refinalized_through_save() {
    let db = TempDb::create("refinalize");
    let persistence = Persistence::new(db.store(), Backend::Primary, fast_retry());
    let prediction = pending_prediction();
    persistence.save(&prediction).await.unwrap();
    let won = persistence
        .record_outcome(&prediction.id, win_outcome())
        .await
        .unwrap();
    let mut lost = prediction.clone();
    lost.finalize(outcome(Verdict::Loss, -1.0, t0() + chrono::Duration::hours(1)))
        .unwrap();

    let err = persistence.save(&lost).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Invariant(InvariantError::IllegalTransition {
            from: Status::Win,
            to: Status::Loss,
            ..
        })
    ));

    persistence.save(&won).await.unwrap();
    let stored = persistence.get(&prediction.id).await.unwrap().unwrap();
    assert_eq!(stored, won);
}

#[tokio::test]
async fn insight_for_a_period_is_written_once() {
    let db = TempDb::create("insight-once");
    let store = db.store();
    store.insert_insight(&insight("2025-W20", 1)).await.unwrap();

    let err = store
        .insert_insight(&insight("2025-W20", 2))
        .await
        .unwrap_err();

    assert!(err.is_invariant());
}

#[tokio::test]
async fn pending_predictions_come_back_oldest_first() {
    let db = TempDb::create("ordering");
    let persistence = Persistence::new(db.store(), Backend::Primary, fast_retry());
    let late = pending_at(t0() + chrono::Duration::hours(3));
    let early = pending_at(t0());
    persistence.save(&late).await.unwrap();
    persistence.save(&early).await.unwrap();

    let pending = persistence.query(&PredictionFilter::pending()).await.unwrap();
    let ids: Vec<_> = pending.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec![early.id, late.id]);
}

#[tokio::test]
async fn exhausted_retries_surface_a_persistence_error() {
    let store = Arc::new(FailingStore::failing_writes(u32::MAX));
    let persistence = Persistence::new(store.clone(), Backend::Primary, fast_retry());

    let err = persistence.save(&pending_prediction()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Persistence(PersistenceError::RetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(store.write_attempts(), 4);
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let store = Arc::new(FailingStore::failing_writes(2));
    let persistence = Persistence::new(store.clone(), Backend::Primary, fast_retry());
    let prediction = pending_prediction();

    persistence.save(&prediction).await.unwrap();

    assert_eq!(store.write_attempts(), 3);
    assert!(persistence.get(&prediction.id).await.unwrap().is_some());
}

#[tokio::test]
async fn unreachable_database_routes_to_fallback_and_health_says_so() {
    let t = TestApp::with_unreachable_database();
    let prediction = pending_prediction();
    t.app.persistence.save(&prediction).await.unwrap();

    let report = health_check(&t.app).await;

    assert_eq!(report.store().backend, Backend::Fallback);
    assert_eq!(report.store().store, "json-file");
    assert!(report.store().ping_ok);
    assert!(!report.store().is_nominal());
    assert!(t.app.config.store.fallback_path.exists());
    assert!(t.app.persistence.get(&prediction.id).await.unwrap().is_some());
}

#[tokio::test]
async fn fallback_file_keeps_records_across_restarts() {
    let t = TestApp::with_unreachable_database();
    let prediction = pending_prediction();
    t.app.persistence.save(&prediction).await.unwrap();

    let path = t.app.config.store.fallback_path.clone();
    let reopened = hindsight::adapter::outbound::file::JsonFileStore::open(&path).unwrap();
    let stored = reopened.get_prediction(&prediction.id).await.unwrap();
    assert_eq!(stored, Some(prediction));
}

#[tokio::test]
async fn learning_writes_a_snapshot_next_to_the_store() {
    let t = TestApp::new();
    t.app
        .persistence
        .save_insight(&insight("2025-W20", 1))
        .await
        .unwrap();

    let content = std::fs::read_to_string(t.dir().join(SNAPSHOT_FILE)).unwrap();
    let snapshot: LearningSnapshot = serde_json::from_str(&content).unwrap();
    assert_eq!(snapshot.backend, "primary");
    assert_eq!(snapshot.latest_insight.unwrap().version, 1);
}
