//! Handler for the `evaluate` command.

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;

use super::command::EvaluateArgs;
use super::output;
use crate::error::Result;
use crate::infrastructure::bootstrap::App;
use crate::infrastructure::config::settings::Config;

/// Run one validation pass and print its report.
pub async fn execute(config: Config, args: &EvaluateArgs) -> Result<()> {
    let app = App::build(config)?;
    let as_of = args.as_of.unwrap_or_else(Utc::now);

    // Never signalled; the pass runs to completion.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let report = app
        .scheduler
        .validation()
        .run_pass(as_of, &shutdown_rx)
        .await?;

    if output::is_json() {
        output::json_output(&json!({
            "command": "evaluate",
            "as_of": as_of,
            "backend": app.persistence.backend(),
            "report": report,
        }));
        return Ok(());
    }

    output::section("Evaluation");
    output::field("As of", as_of.to_rfc3339());
    output::field("Examined", report.examined);
    output::field("Finalized", output::highlight(report.finalized));
    output::field("Still open", report.still_open);
    output::field("Skipped", report.skipped);
    if report.cancelled {
        output::warning("Pass cancelled before all predictions were examined");
    } else {
        output::success("Evaluation pass complete");
    }
    Ok(())
}
