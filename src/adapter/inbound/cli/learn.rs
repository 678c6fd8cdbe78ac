//! Handler for the `learn` command.

use chrono::Utc;
use serde_json::json;

use super::command::LearnArgs;
use super::output;
use crate::application::learning::LearningOutcome;
use crate::error::Result;
use crate::infrastructure::bootstrap::App;
use crate::infrastructure::config::settings::Config;

/// Aggregate and synthesize one period on demand.
pub async fn execute(config: Config, args: &LearnArgs) -> Result<()> {
    let app = App::build(config)?;
    let outcome = app
        .scheduler
        .learning()
        .learn(args.period, Utc::now())
        .await?;

    match outcome {
        LearningOutcome::Skipped(period) => {
            if output::is_json() {
                output::json_output(&json!({
                    "command": "learn",
                    "period": period,
                    "status": "skipped",
                }));
            } else {
                output::warning(&format!("Insight for {period} already exists, nothing to do"));
            }
        }
        LearningOutcome::Completed(record) => {
            if output::is_json() {
                output::json_output(&json!({
                    "command": "learn",
                    "period": record.period,
                    "status": "completed",
                    "insight": record,
                }));
            } else {
                output::section("Learning");
                output::field("Period", record.period);
                output::field("Version", record.version);
                output::field("Trades", record.evidence.total_trades);
                output::field(
                    "Buckets",
                    format!(
                        "{} eligible, {} below threshold",
                        record.evidence.eligible_buckets, record.evidence.ineligible_buckets
                    ),
                );
                output::success(&format!("Insight v{} stored", record.version));
            }
        }
    }
    Ok(())
}
