//! Offline CLI tests for the `km` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `km` with every user directory pointed into `home`
fn km(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("km").expect("km binary");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("NO_COLOR", "1")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("ANTHROPIC_API_KEY");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    km(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("specs"))
        .stdout(predicate::str::contains("kitchenmaster.log"));
}

#[test]
fn test_specs_prints_module_layout() {
    let home = TempDir::new().unwrap();
    km(&home)
        .args(["specs", "--meters", "3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Módulo fregadero"))
        .stdout(predicate::str::contains("3.0"));
}

#[test]
fn test_specs_rejects_unknown_shape() {
    let home = TempDir::new().unwrap();
    km(&home)
        .args(["specs", "--meters", "3", "--shape", "hexagonal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown shape"));
}

#[test]
fn test_conversations_without_credentials() {
    let home = TempDir::new().unwrap();
    km(&home)
        .args(["conversations", "--user", "ana"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations."));
}

#[test]
fn test_send_requires_api_key() {
    let home = TempDir::new().unwrap();
    km(&home).args(["send", "hola"]).assert().failure();
}
