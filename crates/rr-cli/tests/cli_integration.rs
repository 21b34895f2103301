//! CLI integration tests
//!
//! Tests the remote-run CLI using assert_cmd. Nothing here needs an SSH
//! server: commands either stop at argument parsing, touch only the local
//! config file, or fail before connecting.

use assert_cmd::Command;
use predicates::prelude::*;

fn remote_run() -> Command {
    let mut cmd = Command::cargo_bin("remote-run")
        .expect("Failed to locate remote-run binary - ensure it's built before running tests");
    for var in ["RR_HOST", "RR_PORT", "RR_USER", "RR_IDENTITY", "RR_PASSWORD"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_help() {
    remote_run()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-run"))
        .stdout(predicate::str::contains("Run commands and copy files"));
}

#[test]
fn test_cli_version() {
    remote_run()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-run"));
}

#[test]
fn test_cli_run_help() {
    remote_run()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_cli_copy_many_help() {
    remote_run()
        .args(["copy-many", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOCAL=REMOTE"));
}

#[test]
fn test_cli_run_requires_command() {
    remote_run().arg("run").assert().failure();
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    remote_run()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    remote_run()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[ssh]"))
        .stdout(predicate::str::contains("transfer_timeout_secs"));
}

#[test]
fn test_cli_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");

    remote_run()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_cli_rejects_config_without_auth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[ssh]\nhost = \"db\"\nuser = \"ops\"\nuse_agent = false\n").unwrap();

    remote_run()
        .args(["run", "--config"])
        .arg(&path)
        .arg("true")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no authentication method"));
}

#[test]
fn test_cli_copy_many_rejects_bad_pair() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[ssh]\nhost = \"db\"\nuser = \"ops\"\npassword = \"x\"\n").unwrap();

    remote_run()
        .args(["copy-many", "--config"])
        .arg(&path)
        .arg("not-a-pair")
        .assert()
        .failure()
        .stderr(predicate::str::contains("LOCAL=REMOTE"));
}
