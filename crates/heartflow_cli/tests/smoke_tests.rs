//! CLI smoke tests: run the binary against the offline model.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_heartflow"));
    cmd.env("RUST_LOG", "off");
    cmd
}

fn run_with_input(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to wait")
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("--mock"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("heartflow"));
}

#[test]
fn test_quit_exits_cleanly() {
    let mut cmd = cli_bin();
    cmd.args(["--mock", "--config", "/tmp/nonexistent_heartflow_config_12345.toml"]);
    let output = run_with_input(cmd, "quit\n");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is online"));
}

#[test]
fn test_mention_gets_reply_and_relationship_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("relationships.db");

    let mut cmd = cli_bin();
    cmd.args(["--mock", "--gain", "1.0", "--nickname", "阿一", "--db"])
        .arg(&db)
        .args(["--config", "/tmp/nonexistent_heartflow_config_12345.toml"]);
    let output = run_with_input(cmd, "@在吗\n/state\n");

    assert!(output.status.success(), "EOF should end the session");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("嗯嗯，我在听"), "stdout was: {}", stdout);
    assert!(stdout.contains("relationship with 阿一"));
    assert!(db.exists());
}
