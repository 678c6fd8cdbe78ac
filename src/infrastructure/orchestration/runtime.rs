//! Long-running scheduler loop.

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::Result;
use crate::infrastructure::bootstrap::App;

/// Tick the scheduler until `shutdown` flips to `true` or its sender drops.
///
/// The first tick fires immediately, so a freshly started process evaluates
/// right away and catches up on any learning it missed while down.
///
/// # Errors
///
/// Currently infallible; failures inside a tick are reported as degraded
/// events and retried on the next tick.
pub async fn run_with_shutdown(app: &App, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(
        mode = app.config.mode.as_str(),
        backend = %app.persistence.backend(),
        tick_secs = app.config.schedule.tick_secs,
        "Starting hindsight"
    );

    let mut interval = tokio::time::interval(app.config.schedule.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = shutdown.changed() => {
                match result {
                    Ok(()) => {
                        if *shutdown.borrow() {
                            info!("Shutdown signal received");
                            break;
                        }
                    }
                    Err(_) => {
                        info!("Shutdown channel closed");
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                let report = app.scheduler.tick(Utc::now(), &shutdown).await;
                if !report.completed.is_empty() || !report.failed.is_empty() {
                    debug!(
                        completed = report.completed.len(),
                        failed = report.failed.len(),
                        deferred = report.deferred,
                        "Tick finished"
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::outbound::notifier::NotifierRegistry;
    use crate::testkit::config::in_dir;
    use crate::testkit::market::ScriptedMarketData;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn loop_exits_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::assemble(
            in_dir(dir.path()),
            Arc::new(ScriptedMarketData::new()),
            NotifierRegistry::new(),
        )
        .unwrap();
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        });

        tokio::time::timeout(Duration::from_secs(5), run_with_shutdown(&app, rx))
            .await
            .unwrap()
            .unwrap();
        stopper.await.unwrap();
    }
}
