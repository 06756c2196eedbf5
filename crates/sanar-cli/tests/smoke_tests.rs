//! Smoke tests for the sanar CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use sanar::{
    AttemptUpdate, AttributeSnapshot, CandidateSource, HealEvent, HealJournal, Heuristic,
    LocatorDescriptor, LocatorRecord, LocatorStore,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the sanar binary
fn sanar() -> Command {
    let mut cmd = Command::cargo_bin("sanar").expect("sanar binary should exist");
    cmd.env_remove("SANAR_STORE")
        .env_remove("SANAR_HEAL_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Store with one healed locator and one that never needed healing
fn seeded_store(dir: &Path) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let store = LocatorStore::open_dir(dir).unwrap();
        let login = LocatorDescriptor::css("#login-btn");
        let healed = LocatorDescriptor::xpath("//button[normalize-space(.)='Log In']");
        let snapshot = AttributeSnapshot::new().with_tag("button").with_text("Log In");

        let mut record = LocatorRecord::from_first_success(
            "login-submit-button",
            &AttemptUpdate::success(&login, &login, snapshot.clone()),
        )
        .unwrap();
        record.apply(&AttemptUpdate::failure(&login, &login));
        record.apply(&AttemptUpdate::success(&login, &healed, snapshot));
        store.upsert(record).await.unwrap();

        let search = LocatorDescriptor::css("input[name=\"q\"]");
        let record = LocatorRecord::from_first_success(
            "search-box",
            &AttemptUpdate::success(&search, &search, AttributeSnapshot::new().with_tag("input")),
        )
        .unwrap();
        store.upsert(record).await.unwrap();
    });
}

fn seeded_journal(path: &Path) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let journal = HealJournal::new(path);
        for (name, healed) in [("login", "text:Log In"), ("cart", "css:a.cart"), ("login", "id:submit")] {
            let event = HealEvent::new(
                &LocatorDescriptor::css(format!("#{name}")).with_logical_name(name),
                &healed.parse::<LocatorDescriptor>().unwrap(),
                CandidateSource::Heuristic(Heuristic::VisibleText),
                2,
                1.0 / 3.0,
            );
            journal.append(&event).await.unwrap();
        }
    });
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    sanar()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    sanar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("heals"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    sanar().assert().failure();
}

// ============================================================================
// Store Commands
// ============================================================================

#[test]
fn test_history_text() {
    let dir = TempDir::new().unwrap();
    seeded_store(dir.path());

    sanar()
        .args(["history", "login-submit-button", "--color", "never", "--store"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("primary  css:#login-btn"))
        .stdout(predicate::str::contains(
            "1. xpath://button[normalize-space(.)='Log In']",
        ));
}

#[test]
fn test_history_json() {
    let dir = TempDir::new().unwrap();
    seeded_store(dir.path());

    let output = sanar()
        .args(["history", "login-submit-button", "-f", "json", "--store"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let record: LocatorRecord = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record.fallback_history.len(), 1);
    assert_eq!(record.primary_stats.failure_count, 1);
}

#[test]
fn test_history_unknown_name() {
    let dir = TempDir::new().unwrap();
    seeded_store(dir.path());

    sanar()
        .args(["history", "nope", "--store"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No locator named 'nope'"));
}

#[test]
fn test_history_missing_store_not_created() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("absent");

    sanar()
        .args(["history", "login", "--store"])
        .arg(&store)
        .assert()
        .failure();
    assert!(!store.exists());
}

#[test]
fn test_list_and_healed_filter() {
    let dir = TempDir::new().unwrap();
    seeded_store(dir.path());

    sanar()
        .args(["list", "--color", "never", "--store"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("login-submit-button"))
        .stdout(predicate::str::contains("search-box"));

    sanar()
        .args(["list", "--healed", "--color", "never", "--store"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("healed 1x"))
        .stdout(predicate::str::contains("search-box").not());
}

#[test]
fn test_list_store_from_env() {
    let dir = TempDir::new().unwrap();
    seeded_store(dir.path());

    sanar()
        .args(["list", "-f", "json"])
        .env("SANAR_STORE", dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"search-box\""));
}

// ============================================================================
// Heal Journal
// ============================================================================

#[test]
fn test_heals_filtered_and_limited() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("heal.jsonl");
    seeded_journal(&log);

    sanar()
        .args(["heals", "--color", "never", "--name", "login", "--limit", "1", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("-> id:submit"))
        .stdout(predicate::str::contains("text:Log In").not())
        .stdout(predicate::str::contains("cart").not());
}

#[test]
fn test_heals_missing_journal_is_empty() {
    let dir = TempDir::new().unwrap();

    sanar()
        .args(["heals", "-f", "json", "--log"])
        .arg(dir.path().join("none.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

// ============================================================================
// Config Commands
// ============================================================================

#[test]
fn test_config_check_valid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sanar.yaml");
    fs::write(&path, "maxCandidates: 5\ntieMargin: 0.1\n").unwrap();

    sanar()
        .args(["config", "check", "--show"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("maxCandidates: 5"));
}

#[test]
fn test_config_check_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sanar.json");
    fs::write(&path, r#"{"maxCandidates": 0}"#).unwrap();

    sanar()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("maxCandidates must be at least 1"));
}

#[test]
fn test_config_check_unknown_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sanar.yaml");
    fs::write(&path, "maxCandidate: 5\n").unwrap();

    sanar().args(["config", "check"]).arg(&path).assert().failure();
}

#[test]
fn test_config_defaults() {
    sanar()
        .args(["config", "defaults"])
        .assert()
        .success()
        .stdout(predicate::str::contains("perResolutionTimeoutMs: 10000"))
        .stdout(predicate::str::contains("providerTimeoutMs: 2000"));
}
