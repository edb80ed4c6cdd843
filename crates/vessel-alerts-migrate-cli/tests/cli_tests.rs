//! CLI integration tests for vessel-alerts-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! dry runs and exit codes for error conditions. None of them needs a
//! running database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the vessel-alerts-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("vessel-alerts-migrate").unwrap()
}

const SNAPSHOT: &str = r#"{
    "last_updated": "2024-03-01T12:00:00Z",
    "platforms": [
        {
            "name": "Vessel-A",
            "imei": "1234",
            "message_types": [{
                "name": "GPS",
                "alert_triggers": [{"field": "speed", "comparator": ">", "value_threshold": 50}]
            }]
        },
        {
            "name": "No-IMEI",
            "geofences": {"keep_out_points": [{"name": "P", "lat": 1, "lon": 2}]}
        }
    ]
}"#;

/// Write a config pointing at `snapshot` into `dir` and return its path.
fn write_config(dir: &Path, snapshot: &Path, port: u16) -> String {
    let path = dir.join("config.yaml");
    let yaml = format!(
        "source:\n  path: {}\ntarget:\n  host: 127.0.0.1\n  port: {}\n  database: alerts\n  user: postgres\n  connect_timeout_secs: 2\n",
        snapshot.display(),
        port
    );
    std::fs::write(&path, yaml).unwrap();
    path.to_str().unwrap().to_string()
}

fn workspace_on_port(snapshot: Option<&str>, port: u16) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("app_data.json");
    if let Some(content) = snapshot {
        std::fs::write(&snapshot_path, content).unwrap();
    }
    let config = write_config(dir.path(), &snapshot_path, port);
    (dir, config)
}

fn workspace(snapshot: Option<&str>) -> (TempDir, String) {
    workspace_on_port(snapshot, 5432)
}

/// Nothing listens on port 1, so connecting is refused.
const UNREACHABLE_PORT: u16 = 1;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init-schema"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--target-schema"))
        .stdout(predicate::str::contains("--init-schema"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vessel-alerts-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test the database connection"));
}

// =============================================================================
// Exit Code Tests - Config Errors
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_target_section_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  path: app_data.json").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_target_schema_override_exits_with_code_1() {
    let (_dir, config) = workspace(Some(SNAPSHOT));

    cmd()
        .args(["--config", &config, "run", "--dry-run", "--target-schema", "bad schema"])
        .assert()
        .code(1);
}

// =============================================================================
// Dry Run Tests
// =============================================================================

#[test]
fn test_dry_run_prints_summary() {
    let (_dir, config) = workspace(Some(SNAPSHOT));

    cmd()
        .args(["--config", &config, "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run completed!"))
        .stdout(predicate::str::contains("Vessels: 1"))
        .stdout(predicate::str::contains("Alert rules: 1"))
        .stdout(predicate::str::contains("Message types: 1"))
        .stdout(predicate::str::contains("Skipped: 1"));
}

#[test]
fn test_dry_run_json_output() {
    let (_dir, config) = workspace(Some(SNAPSHOT));

    let output = cmd()
        .args(["--config", &config, "--output-json", "run", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["dry_run"], true);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["row_counts"]["vessels"], 1);
    assert_eq!(result["row_counts"]["geofences"], 0);
    assert_eq!(result["skipped"][0]["kind"], "vessel_without_imei");
}

#[test]
fn test_input_override() {
    let (dir, config) = workspace(None);
    let other = dir.path().join("other.json");
    std::fs::write(&other, r#"{"platforms": []}"#).unwrap();

    cmd()
        .args(["--config", &config, "run", "--dry-run", "--input"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains("Vessels: 0"));
}

// =============================================================================
// Exit Code Tests - Snapshot Errors
// =============================================================================

#[test]
fn test_missing_snapshot_exits_with_code_7() {
    let (_dir, config) = workspace(None);

    cmd()
        .args(["--config", &config, "run", "--dry-run"])
        .assert()
        .code(7);
}

#[test]
fn test_malformed_snapshot_exits_with_code_4() {
    let (_dir, config) = workspace(Some("{ not json"));

    cmd()
        .args(["--config", &config, "run", "--dry-run"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid snapshot"));
}

#[test]
fn test_bad_last_updated_exits_with_code_4() {
    let (_dir, config) = workspace(Some(r#"{"last_updated": "yesterday", "platforms": []}"#));

    cmd()
        .args(["--config", &config, "run", "--dry-run"])
        .assert()
        .code(4);
}

// =============================================================================
// Exit Code Tests - Connection Errors
// =============================================================================

#[test]
fn test_health_check_unreachable_exits_with_code_2() {
    let (_dir, config) = workspace_on_port(Some(SNAPSHOT), UNREACHABLE_PORT);

    cmd()
        .args(["--config", &config, "health-check"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("UNHEALTHY"))
        .stderr(predicate::str::contains("Pool error"));
}

#[test]
fn test_health_check_unreachable_json_output() {
    let (_dir, config) = workspace_on_port(Some(SNAPSHOT), UNREACHABLE_PORT);

    let output = cmd()
        .args(["--config", &config, "--output-json", "health-check"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["healthy"], false);
    assert_eq!(result["target_connected"], false);
    assert!(result["target_error"].is_string());
}

#[test]
fn test_run_unreachable_exits_with_code_2() {
    let (_dir, config) = workspace_on_port(Some(SNAPSHOT), UNREACHABLE_PORT);

    cmd()
        .args(["--config", &config, "run"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Migration completed!").not())
        .stderr(predicate::str::contains("Pool error"));
}

#[test]
fn test_init_schema_unreachable_exits_with_code_2() {
    let (_dir, config) = workspace_on_port(None, UNREACHABLE_PORT);

    cmd()
        .args(["--config", &config, "init-schema"])
        .assert()
        .code(2);
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
