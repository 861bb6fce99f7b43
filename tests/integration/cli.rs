//! Integration tests for the `fleetsnap` binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use super::common::snapshot_fixtures::TestSnapshot;

/// Binary isolated from the user's ~/.fleetsnap and environment
fn fleetsnap(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fleetsnap").unwrap();
    cmd.env("FLEETSNAP_HOME", home.path())
        .env_remove("FLEETSNAP_CONFIG")
        .env_remove("FLEETSNAP_SERVER")
        .env_remove("FLEETSNAP_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn small_snapshot() -> TestSnapshot {
    let snapshot = TestSnapshot::new();
    snapshot
        .write("namespaces/prod.json", "Namespace", json!({"metadata": {"name": "prod"}}))
        .write(
            "prod/configmaps/settings.json",
            "ConfigMap",
            json!({"metadata": {"name": "settings", "namespace": "prod"}, "data": {"a": "b"}}),
        );
    snapshot
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    fleetsnap(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("backup").and(predicate::str::contains("restore")));
}

#[test]
fn test_restore_dry_run_succeeds() {
    let home = TempDir::new().unwrap();
    let snapshot = small_snapshot();

    fleetsnap(&home)
        .args(["restore", "--dry-run", "--dir"])
        .arg(&snapshot.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Would restore 2 of 2 resources"));
}

#[test]
fn test_restore_missing_dir_fails() {
    let home = TempDir::new().unwrap();
    let snapshot = TestSnapshot::new();

    fleetsnap(&home)
        .args(["restore", "--dir"])
        .arg(snapshot.path.join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_backup_against_unreachable_server_fails() {
    let home = TempDir::new().unwrap();
    let snapshot = TestSnapshot::new();

    fleetsnap(&home)
        .args(["backup", "--server", "http://127.0.0.1:9", "--dir"])
        .arg(snapshot.path.join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to enumerate namespaces"));
}

#[test]
fn test_fail_on_errors_sets_exit_code() {
    let home = TempDir::new().unwrap();
    let snapshot = small_snapshot();
    snapshot.write_raw("prod/configmaps/broken.json", b"{");

    fleetsnap(&home)
        .args(["restore", "--dry-run", "--dir"])
        .arg(&snapshot.path)
        .assert()
        .success();

    fleetsnap(&home)
        .args(["restore", "--dry-run", "--fail-on-errors", "--dir"])
        .arg(&snapshot.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Some resources failed"));
}

#[test]
fn test_config_file_supplies_defaults() {
    let home = TempDir::new().unwrap();
    let snapshot = small_snapshot();
    let config = home.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "dry_run = true\nrestore_dir = {:?}\n",
            snapshot.path.to_str().unwrap()
        ),
    )
    .unwrap();

    fleetsnap(&home)
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("Would restore 2 of 2 resources"));
}

#[test]
fn test_malformed_config_fails() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("broken.toml");
    std::fs::write(&config, "max_concurrency = [").unwrap();

    fleetsnap(&home)
        .args(["restore", "--dry-run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}
