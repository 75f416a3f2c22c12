//! Integration tests for the `studente` CLI binary.
//!
//! Argument parsing, help output, completions and config commands run
//! offline; tracker-bound commands run against a local WebSocket server.
#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use assert_cmd::cargo::cargo_bin_cmd;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

// ── Helpers ─────────────────────────────────────────────────────────

const NO_CONFIG: &str = "/tmp/studente-cli-test-nonexistent/config.toml";

/// Build a [`Command`] for the `studente` binary with env isolation.
///
/// Clears all `STUDENTE_*` env vars and points config lookups at a
/// nonexistent path so tests never touch the user's real configuration.
fn studente_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("studente");
    cmd.env("HOME", "/tmp/studente-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/studente-cli-test-nonexistent")
        .env("STUDENTE_CONFIG", NO_CONFIG)
        .env("NO_COLOR", "1")
        .env_remove("STUDENTE_PROFILE")
        .env_remove("STUDENTE_HOST")
        .env_remove("STUDENTE_PORT")
        .env_remove("STUDENTE_REGION")
        .env_remove("STUDENTE_OUTPUT")
        .env_remove("STUDENTE_TIMEOUT")
        .env_remove("STUDENTE_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Local stand-in for the activity tracker: accepts one client, records
/// every JSON message it sends, and answers with `script(message)`.
struct FakeTracker {
    port: u16,
    received: mpsc::UnboundedReceiver<Value>,
}

impl FakeTracker {
    async fn start(script: fn(&Value) -> Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, received) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let (mut write, mut read) = ws.split();
            while let Some(Ok(frame)) = read.next().await {
                let Message::Text(text) = frame else { continue };
                let msg: Value = serde_json::from_str(text.as_str()).unwrap();
                for reply in script(&msg) {
                    if write.send(Message::text(reply.to_string())).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(msg);
            }
        });

        Self { port, received }
    }

    /// Everything received so far.
    fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(msg) = self.received.try_recv() {
            out.push(msg);
        }
        out
    }
}

fn types(messages: &[Value]) -> HashSet<String> {
    messages
        .iter()
        .filter_map(|m| m["type"].as_str().map(str::to_owned))
        .collect()
}

/// Run the binary off the async runtime so the fake tracker keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn against(port: u16, args: &[&str]) -> assert_cmd::Command {
    let mut cmd = studente_cmd();
    cmd.args(["--host", "127.0.0.1", "--port", &port.to_string(), "--timeout", "5"])
        .args(args);
    cmd
}

fn login_script(msg: &Value) -> Vec<Value> {
    if msg["type"] != "VERIFY_PASSWORD" {
        return Vec::new();
    }
    if msg["content"]["password"] != "s3cret!" {
        return vec![json!({
            "type": "PASSWORD_VERIFY_RESPONSE",
            "content": {"success": false, "error": "Invalid password"},
        })];
    }
    vec![
        json!({
            "service": "ec2",
            "instances": [{
                "id": "i-0abc",
                "name": "build-box",
                "state": "running",
                "type": "t3.micro",
                "region": "ap-northeast-2",
            }],
        }),
        json!({
            "type": "PASSWORD_VERIFY_RESPONSE",
            "content": {"success": true, "authKey": "key-1"},
        }),
    ]
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = studente_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    studente_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("activity tracker")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("refresh"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("instance")),
    );
}

#[test]
fn test_version_flag() {
    studente_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("studente"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    studente_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    studente_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument errors ─────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = studente_cmd().arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_refresh_rejects_unknown_service() {
    let output = studente_cmd().args(["refresh", "rds"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn test_instance_requires_an_id() {
    studente_cmd()
        .args(["instance", "start"])
        .assert()
        .failure()
        .code(2);
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    studente_cmd()
        .args(["config", "path", "--config", "/tmp/elsewhere/studente.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/studente.toml"));
}

#[test]
fn test_config_show_no_config() {
    // A missing file renders the built-in defaults.
    studente_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout"));
}

#[test]
fn test_config_show_masks_passwords() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[profiles.lab]\nhost = \"tracker.lab\"\npassword = \"hunter22\"\n",
    )
    .unwrap();

    studente_cmd()
        .args(["config", "show", "--config", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("tracker.lab")
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("hunter22").not()),
        );
}

#[test]
fn test_unknown_profile_exit_code() {
    studente_cmd()
        .args(["--profile", "nope", "ping"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_zero_port_is_usage_error() {
    studente_cmd()
        .args(["--port", "0", "ping"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("port"));
}

// ── Tracker-bound commands ──────────────────────────────────────────

#[test]
fn test_ping_closed_port_is_connection_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    studente_cmd()
        .args([
            "--host",
            "127.0.0.1",
            "--port",
            &port.to_string(),
            "--timeout",
            "1",
            "ping",
        ])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Could not connect to tracker"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_sends_test_probe() {
    let mut tracker = FakeTracker::start(|_| Vec::new()).await;

    let output = run(against(tracker.port, &["--output", "json", "ping"])).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["testSent"], true);

    let sent = types(&tracker.drain());
    assert!(sent.contains("PASSWORD_STATUS_CHECK"), "sent: {sent:?}");
    assert!(sent.contains("test"), "sent: {sent:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_logs_in_and_reports_instances() {
    let mut tracker = FakeTracker::start(login_script).await;

    let mut cmd = against(tracker.port, &["--output", "json", "status", "--wait", "0"]);
    cmd.env("STUDENTE_PASSWORD", "s3cret!");
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let snapshot: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["authenticated"], true);
    assert_eq!(snapshot["instances"][0]["id"], "i-0abc");
    assert_eq!(snapshot["instances"][0]["state"], "running");

    let sent = tracker.drain();
    let login = sent.iter().find(|m| m["type"] == "VERIFY_PASSWORD").unwrap();
    assert_eq!(login["content"]["password"], "s3cret!");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_wrong_password_is_auth_error() {
    let tracker = FakeTracker::start(login_script).await;

    let mut cmd = against(tracker.port, &["status", "--wait", "0"]);
    cmd.env("STUDENTE_PASSWORD", "guess");
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Invalid password"));
}
