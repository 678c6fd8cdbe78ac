//! Runtime health reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::persistence::StoreHealth;
use crate::application::scheduler::SchedulerState;
use crate::domain::period::PeriodId;
use crate::infrastructure::bootstrap::App;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    name: &'static str,
    critical: bool,
    status: HealthStatus,
}

impl HealthCheck {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

/// The most recent insight, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestInsight {
    pub period: PeriodId,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    checks: Vec<HealthCheck>,
    store: StoreHealth,
    scheduler: SchedulerState,
    latest_insight: Option<LatestInsight>,
}

impl HealthReport {
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    pub fn store(&self) -> &StoreHealth {
        &self.store
    }

    pub fn scheduler(&self) -> SchedulerState {
        self.scheduler
    }

    pub fn latest_insight(&self) -> Option<&LatestInsight> {
        self.latest_insight.as_ref()
    }

    pub fn is_healthy(&self) -> bool {
        self.checks
            .iter()
            .filter(|check| check.critical())
            .all(HealthCheck::is_healthy)
    }
}

/// Probe the store and summarize engine state.
///
/// A reachable fallback store is healthy but flagged; an unreachable store
/// is not.
pub async fn health_check(app: &App) -> HealthReport {
    let store = app.persistence.health_check().await;
    let mut checks = Vec::new();

    checks.push(HealthCheck {
        name: "store",
        critical: true,
        status: if store.ping_ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(store.detail.clone())
        },
    });

    checks.push(HealthCheck {
        name: "primary_backend",
        critical: false,
        status: if store.is_nominal() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy(store.detail.clone())
        },
    });

    let latest_insight = match app.persistence.latest_insight().await {
        Ok(record) => {
            checks.push(HealthCheck {
                name: "insights",
                critical: false,
                status: if record.is_some() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy("no insight generated yet".to_string())
                },
            });
            record.map(|r| LatestInsight {
                period: r.period,
                version: r.version,
                generated_at: r.generated_at,
            })
        }
        Err(e) => {
            checks.push(HealthCheck {
                name: "insights",
                critical: false,
                status: HealthStatus::Unhealthy(e.to_string()),
            });
            None
        }
    };

    HealthReport {
        checks,
        store,
        scheduler: app.scheduler.state(),
        latest_insight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::persistence::Backend;
    use crate::port::outbound::notifier::NotifierRegistry;
    use crate::testkit::config::in_dir;
    use crate::testkit::domain::insight;
    use crate::testkit::market::ScriptedMarketData;
    use std::sync::Arc;

    fn app(config: crate::infrastructure::config::settings::Config) -> App {
        App::assemble(
            config,
            Arc::new(ScriptedMarketData::new()),
            NotifierRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn health_report_is_healthy_when_all_critical_pass() {
        let report = HealthReport {
            checks: vec![
                HealthCheck {
                    name: "critical_pass",
                    critical: true,
                    status: HealthStatus::Healthy,
                },
                HealthCheck {
                    name: "non_critical_fail",
                    critical: false,
                    status: HealthStatus::Unhealthy("warning".to_string()),
                },
            ],
            store: StoreHealth {
                backend: Backend::Primary,
                store: "sqlite",
                ping_ok: true,
                detail: "ok".to_string(),
            },
            scheduler: SchedulerState::Idle,
            latest_insight: None,
        };

        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn fresh_primary_is_healthy_without_insights() {
        let dir = tempfile::tempdir().unwrap();
        let report = health_check(&app(in_dir(dir.path()))).await;

        assert!(report.is_healthy());
        assert_eq!(report.store().backend, Backend::Primary);
        assert_eq!(report.scheduler(), SchedulerState::Idle);
        assert!(report.latest_insight().is_none());

        let insights = report
            .checks()
            .iter()
            .find(|c| c.name() == "insights")
            .unwrap();
        assert!(!insights.is_healthy());
    }

    #[tokio::test]
    async fn fallback_is_flagged_but_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = in_dir(dir.path());
        config.store.database_url = dir
            .path()
            .join("absent")
            .join("hindsight.db")
            .display()
            .to_string();

        let report = health_check(&app(config)).await;

        assert!(report.is_healthy());
        assert_eq!(report.store().backend, Backend::Fallback);
        let primary = report
            .checks()
            .iter()
            .find(|c| c.name() == "primary_backend")
            .unwrap();
        assert!(!primary.is_healthy());
    }

    #[tokio::test]
    async fn latest_insight_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(in_dir(dir.path()));
        app.persistence
            .save_insight(&insight("2025-W20", 1))
            .await
            .unwrap();

        let report = health_check(&app).await;
        let latest = report.latest_insight().unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.period.to_string(), "2025-W20");
    }

    #[test]
    fn health_status_equality() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(
            HealthStatus::Healthy,
            HealthStatus::Unhealthy("error".to_string())
        );
    }
}
