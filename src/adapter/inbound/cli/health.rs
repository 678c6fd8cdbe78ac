//! Handler for the `health` command.

use serde_json::json;

use super::output;
use crate::error::{Error, Result};
use crate::infrastructure::bootstrap::App;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::orchestration::health::{health_check, HealthStatus};

/// Report store backend, scheduler state and latest insight.
///
/// # Errors
///
/// Fails when a critical check is unhealthy.
pub async fn execute(config: Config) -> Result<()> {
    let app = App::build(config)?;
    let report = health_check(&app).await;

    if output::is_json() {
        output::json_output(&json!({
            "command": "health",
            "status": if report.is_healthy() { "healthy" } else { "unhealthy" },
            "report": report,
        }));
    } else {
        output::section("Health Check");
        for check in report.checks() {
            let suffix = if check.critical() { " (critical)" } else { "" };
            let value = match check.status() {
                HealthStatus::Healthy => "healthy".to_string(),
                HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
            };
            output::field(&format!("{}{}", check.name(), suffix), value);
        }
        output::field("backend", report.store().backend);
        output::field("scheduler", report.scheduler());
        match report.latest_insight() {
            Some(latest) => output::field(
                "latest",
                format!("{} v{} ({})", latest.period, latest.version, latest.generated_at),
            ),
            None => output::field("latest", output::muted("none")),
        }
    }

    if !report.is_healthy() {
        output::error("Health check failed");
        return Err(Error::Connection("health check failed".to_string()));
    }
    output::success("Health check passed");
    Ok(())
}
