use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A config file pointing every store path into a fresh temp directory.
struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("hindsight.toml");
        std::fs::write(
            &config,
            format!(
                "[logging]\nlevel = \"warn\"\n\n[store]\ndatabase_url = '{}'\nfallback_path = '{}'\n",
                dir.path().join("engine.db").display(),
                dir.path().join("fallback.json").display(),
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("hindsight").unwrap();
        cmd.current_dir(self.path())
            .env_remove("DATABASE_URL")
            .env_remove("HINDSIGHT_MODE")
            .env_remove("TELEGRAM_BOT_TOKEN")
            .env_remove("TELEGRAM_CHAT_ID")
            .arg("-c")
            .arg(&self.config);
        cmd
    }
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("hindsight")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("learn"))
        .stdout(predicate::str::contains("health"));
}

#[test]
fn health_reports_primary_store() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["health", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"healthy""#))
        .stdout(predicate::str::contains(r#""backend":"primary""#));

    assert!(ws.path().join("engine.db").exists());
}

#[test]
fn insight_without_history_prints_null() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["insight", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""insight":null"#));
}

#[test]
fn evaluate_with_nothing_pending_succeeds() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["evaluate", "--json", "--as-of", "2025-05-19T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""command":"evaluate""#));
}

#[test]
fn learning_a_period_twice_is_skipped_the_second_time() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["learn", "--period", "2025-W20", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"completed""#));

    ws.cmd()
        .args(["learn", "--period", "2025-W20", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"skipped""#));

    ws.cmd()
        .args(["insight", "--history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""period":"2025-W20""#));
}

#[test]
fn malformed_period_is_rejected_by_the_parser() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["learn", "--period", "2025-W99"])
        .assert()
        .failure();
}

#[test]
fn invalid_config_fails_with_the_field_name() {
    let ws = Workspace::new();
    let bad = ws.path().join("bad.toml");
    std::fs::write(&bad, "[schedule]\ntick_secs = 0\n").unwrap();

    Command::cargo_bin("hindsight")
        .unwrap()
        .env_remove("DATABASE_URL")
        .arg("-c")
        .arg(&bad)
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("schedule.tick_secs"));
}
