//! Integration tests for the `tessly` CLI binary.
//!
//! Argument parsing, help output, completions and error exit codes run
//! without a network; vehicle commands run against a wiremock Tessie API.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIN: &str = "5YJ3E1EA7KF000001";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tessly` binary with env isolation.
///
/// Clears all `TESSLY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn tessly_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tessly");
    cmd.env("HOME", "/tmp/tessly-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tessly-cli-test-nonexistent")
        .env_remove("TESSLY_PROFILE")
        .env_remove("TESSLY_VIN")
        .env_remove("TESSLY_TOKEN")
        .env_remove("TESSLY_API_BASE")
        .env_remove("TESSLY_OUTPUT")
        .env_remove("TESSLY_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A command already pointed at `server` with a token and VIN.
fn vehicle_cmd(server: &MockServer) -> assert_cmd::Command {
    let mut cmd = tessly_cmd();
    cmd.args(["--api-base", &server.uri(), "--token", "test-token", "--vin", VIN]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mount_snapshot(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/api/1/vehicles/{VIN}/vehicle_data")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "vin": VIN,
                "charge_state": {
                    "battery_level": 80,
                    "charge_limit_soc": 90,
                    "charging_state": "Stopped"
                },
                "vehicle_state": { "locked": true }
            }
        })))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = tessly_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    tessly_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("poll")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("action"))
            .and(predicate::str::contains("vehicles")),
    );
}

#[test]
fn test_version_flag() {
    tessly_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tessly"));
}

#[test]
fn test_completions_zsh() {
    tessly_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    tessly_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Offline commands ────────────────────────────────────────────────

#[test]
fn test_profiles_plain() {
    tessly_cmd()
        .args(["profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Tessly.Percent")
                .and(predicate::str::contains("Tessly.Amps"))
                .and(predicate::str::contains("Tessly.Lock")),
        );
}

#[test]
fn test_profiles_json() {
    let output = tessly_cmd().args(["profiles", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let profiles: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(profiles.as_array().unwrap().len(), 10);
}

#[test]
fn test_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap();

    tessly_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args(["--profile", "car", "--vin", VIN, "config", "init"])
        .args(["--token-env", "MY_TESSIE_TOKEN", "--wake"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved profile 'car'"));

    tessly_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(VIN)
                .and(predicate::str::contains("MY_TESSIE_TOKEN"))
                .and(predicate::str::contains("default_profile = \"car\"")),
        );

    tessly_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(home));
}

#[test]
fn test_config_init_requires_vin() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap();

    let output = tessly_cmd()
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .args(["config", "init"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = tessly_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_poll_without_token() {
    let output = tessly_cmd().args(["--vin", VIN, "poll"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
    assert!(combined_output(&output).contains("No API token"));
}

#[test]
fn test_poll_without_vin() {
    let output = tessly_cmd()
        .args(["--token", "test-token", "poll"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("No VIN"));
}

#[test]
fn test_unknown_profile() {
    let output = tessly_cmd()
        .args(["--profile", "nope", "poll"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_unknown_action() {
    let output = tessly_cmd()
        .args(["--token", "t", "--vin", VIN, "action", "launch_rocket", "true"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Unknown action"), "{text}");
    assert!(text.contains("act_charge_limit"), "{text}");
}

// ── Against a mock API ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_prints_points() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;

    let output = vehicle_cmd(&server)
        .args(["-o", "json", "poll"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let points: Value = serde_json::from_slice(&output.stdout).unwrap();
    let find = |identifier: &str| {
        points
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["identifier"] == identifier)
            .cloned()
    };
    assert_eq!(find("act_charge_limit").unwrap()["value"], json!(90));
    assert_eq!(find("act_locked").unwrap()["value"], json!(true));
    assert_eq!(find("act_charging").unwrap()["value"], json!(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_filter() {
    let server = MockServer::start().await;
    mount_snapshot(&server).await;

    let output = vehicle_cmd(&server)
        .args(["-o", "plain", "poll", "--filter", "act_charge_limit"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "{stdout}");
    assert!(stdout.contains("=90 %"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poll_failure_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/1/vehicles/{VIN}/vehicle_data")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let output = vehicle_cmd(&server).arg("poll").output().unwrap();
    assert_eq!(output.status.code(), Some(7));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_action_clamps_charge_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/set_charge_limit")))
        .and(query_param("wait_for_completion", "true"))
        .and(body_json(json!({ "percent": 100 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    vehicle_cmd(&server)
        .args(["-o", "plain", "action", "set_charge_limit", "150"])
        .assert()
        .success()
        .stdout(predicate::str::contains("act_charge_limit=100"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unconfirmed_action_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{VIN}/command/honk")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": false })))
        .mount(&server)
        .await;

    let output = vehicle_cmd(&server).args(["action", "honk"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("not confirmed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_vehicles_lists_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "vin": VIN, "last_state": { "display_name": "Roadrunner" } },
                { "vin": "7SAYGDEE0PF000002", "display_name": "Bolt" }
            ]
        })))
        .mount(&server)
        .await;

    tessly_cmd()
        .args(["--api-base", &server.uri(), "--token", "test-token"])
        .args(["-o", "plain", "vehicles"])
        .assert()
        .success()
        .stdout(predicate::str::contains(VIN).and(predicate::str::contains("7SAYGDEE0PF000002")));
}
