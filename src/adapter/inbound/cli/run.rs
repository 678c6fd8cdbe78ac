//! Handler for the `run` command.

use tokio::signal;
use tokio::sync::watch;
use tracing::warn;

use super::output;
use crate::error::Result;
use crate::infrastructure::bootstrap::App;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::orchestration::runtime;

/// Run the scheduler until Ctrl-C.
pub async fn execute(config: Config) -> Result<()> {
    let app = App::build(config)?;
    print_startup(&app).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    runtime::run_with_shutdown(&app, shutdown_rx).await?;
    output::success("Stopped");
    Ok(())
}

async fn print_startup(app: &App) {
    let store = app.persistence.health_check().await;

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Mode", app.config.mode.as_str());
    output::field("Store", format!("{} ({})", store.store, store.backend));
    output::field(
        "Tick",
        format!("{}s", app.config.schedule.tick_interval().as_secs()),
    );
    output::field("Notifiers", app.notifiers.len());
    if !store.is_nominal() {
        output::warning(&format!("Primary store unavailable: {}", store.detail));
    }
    output::hint("press Ctrl-C to stop");
}
