//! CLI integration tests
//!
//! Runs the built binary against temporary state files. None of these
//! paths reach a model provider.

mod support;

use std::process::Command;
use support::docweaver_binary;
use tempfile::TempDir;

fn docweaver(state_dir: &TempDir) -> Command {
    let mut cmd = Command::new(docweaver_binary());
    cmd.arg("--state")
        .arg(state_dir.path().join("state.json"))
        .env_remove("RUST_LOG")
        .env_remove("DOCWEAVER_PROVIDER")
        .env_remove("DOCWEAVER_MODEL");
    cmd
}

#[test]
fn test_help() {
    let output = Command::new(docweaver_binary())
        .arg("--help")
        .output()
        .expect("Failed to execute docweaver");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("minimap"));
    assert!(stdout.contains("ask"));
    assert!(stdout.contains("classify"));
}

#[test]
fn test_config_json_reflects_environment() {
    let dir = TempDir::new().unwrap();
    let output = docweaver(&dir)
        .args(["config", "--format", "json"])
        .env("DOCWEAVER_MODEL", "llama3.1:8b")
        .env("DOCWEAVER_POLL_INTERVAL", "30")
        .output()
        .expect("Failed to execute docweaver");

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["provider"], "ollama");
    assert_eq!(value["model"], "llama3.1:8b");
    assert_eq!(value["poll_interval_secs"], 30);
}

#[test]
fn test_ask_unknown_repository_exits_with_precondition_code() {
    let dir = TempDir::new().unwrap();
    let output = docweaver(&dir)
        .args(["ask", "acme", "missing", "What is it?"])
        .output()
        .expect("Failed to execute docweaver");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("acme/missing"));
}

#[test]
fn test_classify_unknown_warehouse_fails() {
    let dir = TempDir::new().unwrap();
    let output = docweaver(&dir)
        .args(["classify", "nope"])
        .output()
        .expect("Failed to execute docweaver");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Warehouse not found: nope"));
}

#[test]
fn test_minimap_once_without_candidates_saves_state() {
    let dir = TempDir::new().unwrap();
    let output = docweaver(&dir)
        .args(["minimap", "--once"])
        .output()
        .expect("Failed to execute docweaver");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "No warehouse needs a mini-map\n"
    );
    assert!(dir.path().join("state.json").exists());
}
