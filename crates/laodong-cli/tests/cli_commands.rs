//! Integration tests for commands that need no backend.
//!
//! These cover argument parsing, configuration handling and startup errors.
//! Nothing here opens a network connection.

mod common;

use predicates::prelude::*;
use tempfile::TempDir;

use common::{laodong_cmd, write_config};

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("health"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_chat_help_documents_repl_commands() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/reset"))
        .stdout(predicate::str::contains("/exit"));
}

#[test]
fn test_version() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// config check / show
// ============================================================================

#[test]
fn test_config_check_defaults_when_file_missing() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not found, using defaults"))
        .stdout(predicate::str::contains("corpus.path is not set"));
}

#[test]
fn test_config_check_valid_file() {
    let home = TempDir::new().expect("create temp dir");
    write_config(
        home.path(),
        "router:\n  threshold: 0.6\ncorpus:\n  path: /data/chunks.jsonl\n",
    );

    laodong_cmd(home.path())
        .args(["config", "check", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"))
        .stdout(predicate::str::contains("\"exists\": true"));
}

#[test]
fn test_config_check_rejects_reranker_above_fusion() {
    let home = TempDir::new().expect("create temp dir");
    write_config(home.path(), "reranker:\n  topN: 20\n");

    laodong_cmd(home.path())
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[err] Configuration has errors"))
        .stderr(predicate::str::contains("Hint:"));
}

#[test]
fn test_config_check_reports_parse_errors() {
    let home = TempDir::new().expect("create temp dir");
    let path = home.path().join("broken.yaml");
    std::fs::write(&path, "router: [not, a, map\n").expect("write config");

    laodong_cmd(home.path())
        .args(["config", "check", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn test_config_show_applies_corpus_override() {
    let home = TempDir::new().expect("create temp dir");
    write_config(home.path(), "session:\n  tokenBudget: 8000\n");

    laodong_cmd(home.path())
        .args(["config", "show", "--corpus", "/data/chunks.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tokenBudget: 8000"))
        .stdout(predicate::str::contains("/data/chunks.jsonl"));
}

#[test]
fn test_config_show_json_reads_env_corpus() {
    let home = TempDir::new().expect("create temp dir");

    let output = laodong_cmd(home.path())
        .env("LAODONG_CORPUS", "/srv/corpus.jsonl")
        .args(["config", "show", "--json"])
        .output()
        .expect("run laodong");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["corpus"]["path"], "/srv/corpus.jsonl");
    assert_eq!(json["retrieval"]["fusion"]["rrfK"], 60.0);
}

// ============================================================================
// Startup errors
// ============================================================================

#[test]
fn test_ask_without_corpus_explains_how_to_set_it() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .args(["ask", "Điều 139 quy định gì về thai sản?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[err] Failed to initialize the assistant"))
        .stderr(predicate::str::contains("corpus.path is not set"))
        .stderr(predicate::str::contains("LAODONG_CORPUS"));
}

#[test]
fn test_health_with_missing_corpus_file() {
    let home = TempDir::new().expect("create temp dir");
    let missing = home.path().join("missing.jsonl");

    laodong_cmd(home.path())
        .args(["health", "--corpus"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.jsonl"));
}

#[test]
fn test_unknown_command_fails() {
    let home = TempDir::new().expect("create temp dir");

    laodong_cmd(home.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
