//! CLI integration tests for the `tradejournal` command-line interface.
//!
//! These tests cover help output, argument parsing and configuration
//! failures that surface before any network traffic.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the tradejournal binary, isolated from the user's config.
fn tradejournal(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tradejournal").unwrap();
    cmd.env("TRADEJOURNAL_CONFIG_DIR", config_dir.path())
        .env_remove("TRADEJOURNAL_KEYCLOAK_URL")
        .env_remove("TRADEJOURNAL_API_URL")
        .current_dir(config_dir.path());
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trading Journal"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("api"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tradejournal"));
}

#[test]
fn test_auth_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .args(["auth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_api_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .args(["api", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("whoami"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("trades"))
        .stdout(predicate::str::contains("signals"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Flag Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_global_flags_accepted() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .args(["--verbose", "--json", "--paste", "--no-browser", "auth", "--help"])
        .assert()
        .success();
}

#[test]
fn test_missing_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir).assert().failure();
}

#[test]
fn test_unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .arg("trade-everything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_api_get_requires_path() {
    let dir = TempDir::new().unwrap();
    tradejournal(&dir)
        .args(["api", "get"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<PATH>"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_remote_redirect_uri_is_rejected_before_sign_in() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
[identity]
redirect_uri = "https://journal.example.com/callback"
"#,
    )
    .unwrap();

    tradejournal(&dir)
        .args(["auth", "login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loopback"));
}

#[test]
fn test_project_config_overrides_user_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
[identity]
redirect_uri = "http://127.0.0.1:8765/callback"
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("tradejournal.toml"),
        r#"
[identity]
redirect_uri = "http://journal.example.com/callback"
"#,
    )
    .unwrap();

    tradejournal(&dir)
        .args(["api", "whoami"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("journal.example.com"));
}
