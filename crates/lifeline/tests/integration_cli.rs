use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn lifeline() -> Command {
    let mut cmd = Command::cargo_bin("lifeline").unwrap();
    cmd.env_remove("LIFELINE_CONFIG")
        .env_remove("LIFELINE_LOG")
        .env_remove("LIFELINE_LOCATION")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_output() {
    lifeline()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "End-to-end lifecycle tests for a hosted file-sharing app",
        ))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn test_version_output() {
    lifeline()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "lifeline {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_plan_lists_all_stages() {
    lifeline()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. install"))
        .stdout(predicate::str::contains("8. restore"))
        .stdout(predicate::str::contains("   - move app to 'test2'"))
        .stdout(predicate::str::contains("15. final-uninstall"));
}

#[test]
fn test_plan_json_reads_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("lifeline.toml");
    fs::write(&config, "location = \"staging\"\nrelocation_suffix = \"-moved\"\n").unwrap();

    let output = lifeline()
        .args(["plan", "--output", "json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stages = plan["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 15);
    let relocate = stages.iter().find(|s| s["name"] == "relocate").unwrap();
    assert!(relocate["steps"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s == "move app to 'staging-moved'"));
}

#[test]
fn test_location_flag_overrides_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("lifeline.toml");
    fs::write(&config, "location = \"staging\"\n").unwrap();

    lifeline()
        .args(["plan", "--location", "qa", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("install app at 'qa'"));
}

#[test]
fn test_run_without_username_is_config_error() {
    lifeline()
        .arg("run")
        .env_remove("USERNAME")
        .env("PASSWORD", "integration-secret")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("USERNAME env var needs to be set"));
}

#[test]
fn test_run_without_password_is_config_error() {
    lifeline()
        .arg("run")
        .env("USERNAME", "admin")
        .env_remove("PASSWORD")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PASSWORD env var needs to be set"));
}

#[test]
fn test_malformed_config_file_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("broken.toml");
    fs::write(&config, "location = [\n").unwrap();

    lifeline()
        .args(["plan", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse configuration file"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("typo.toml");
    fs::write(&config, "locaton = \"test\"\n").unwrap();

    lifeline()
        .args(["plan", "--config"])
        .arg(&config)
        .assert()
        .code(2);
}

#[test]
fn test_unsplittable_platform_cli_fails_before_connecting() {
    lifeline()
        .args([
            "run",
            "--platform-cli",
            "cloudron 'x",
            "--webdriver-url",
            "http://127.0.0.1:9",
        ])
        .env("USERNAME", "admin")
        .env("PASSWORD", "integration-secret-77")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("platform_cli is not a valid command line"))
        .stderr(predicate::str::contains("127.0.0.1:9").not());
}

#[test]
fn test_unreachable_webdriver_fails_without_leaking_password() {
    lifeline()
        .args(["run", "--webdriver-url", "http://127.0.0.1:9", "--wait-timeout-ms", "500"])
        .env("USERNAME", "admin")
        .env("PASSWORD", "integration-secret-77")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("integration-secret-77").not());
}

#[cfg(unix)]
#[test]
fn test_resolve_reports_platform_failure() {
    lifeline()
        .args(["resolve", "--platform-cli", "false"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed with exit code 1"));
}
