//! E2E CLI workflow: sync a scripted ledger, then read the store back.
//!
//! Each test runs `lot` as a subprocess in an isolated temp directory. Gateways
//! point at a closed local port so metadata lookups fail fast.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

const SCRIPT: &str = r#"{
    "ops": [
        { "op": "mint", "caller": "0x00000000000000000000000000000000000000A1", "metadata": "ipfs://QmPepper" },
        { "op": "inspect", "caller": "0x00000000000000000000000000000000000000b1", "item": 1 },
        { "op": "transfer", "caller": "0x00000000000000000000000000000000000000a1", "item": 1,
          "to": "0x00000000000000000000000000000000000000c1" },
        { "op": "transfer", "caller": "0x00000000000000000000000000000000000000c1", "item": 1,
          "to": "0x00000000000000000000000000000000000000d1" },
        { "op": "mint", "caller": "0x00000000000000000000000000000000000000a1", "metadata": "ipfs://QmCocoa" }
    ]
}"#;

fn lot_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lot"));
    cmd.current_dir(dir);
    cmd.env("LOTLINE_LOG", "error");
    cmd.env("LOTLINE_GATEWAYS", "http://127.0.0.1:9/ipfs/");
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env_remove("FORMAT");
    cmd
}

fn project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("ledger.json"), SCRIPT).expect("write script");
    dir
}

fn json_of(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("lot should not crash");
    assert!(
        output.status.success(),
        "lot failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn sync(dir: &Path) -> Value {
    json_of(lot_cmd(dir).args(["sync", "--script", "ledger.json", "--json"]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn sync_writes_store_and_list_reads_it() {
    let dir = project();
    let stats = sync(dir.path());
    assert_eq!(stats["items_loaded"], 2);
    assert_eq!(stats["metadata_errors"], 2);
    assert!(dir.path().join(".lotline/store.json").exists());

    let list = json_of(lot_cmd(dir.path()).args(["list", "--json"]));
    let rows = list.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["name"], "Lot #1");
    assert_eq!(rows[0]["status"], "DELIVERED");
    assert_eq!(rows[0]["holder_role"], "RETAILER");
    assert_eq!(rows[1]["status"], "CREATED");

    let filtered = json_of(lot_cmd(dir.path()).args(["list", "--status", "created", "--json"]));
    assert_eq!(filtered.as_array().map(Vec::len), Some(1));
}

#[test]
fn repeated_sync_adds_nothing() {
    let dir = project();
    let first = sync(dir.path());
    let second = sync(dir.path());
    assert_eq!(second["appended"], 0);
    assert_eq!(second["duplicates"], first["appended"]);

    let show = json_of(lot_cmd(dir.path()).args(["show", "1", "--json"]));
    assert_eq!(show["timeline"].as_array().map(Vec::len), Some(6));
}

#[test]
fn show_lists_timeline_newest_first() {
    let dir = project();
    sync(dir.path());

    let show = json_of(lot_cmd(dir.path()).args(["show", "#1", "--json"]));
    assert_eq!(show["holder"], "0x00000000000000000000000000000000000000d1");
    let timeline = show["timeline"].as_array().expect("timeline");
    assert_eq!(timeline.last().map(|e| &e["kind"]), Some(&Value::from("REGISTERED")));
    let first = timeline[0]["timestamp"].as_str().expect("ts");
    let last = timeline[timeline.len() - 1]["timestamp"].as_str().expect("ts");
    assert!(first > last, "{first} should be newer than {last}");

    lot_cmd(dir.path())
        .args(["show", "1", "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Timeline (6)"));
}

#[test]
fn resync_refreshes_one_item() {
    let dir = project();
    sync(dir.path());

    let stats = json_of(lot_cmd(dir.path()).args(["resync", "2", "--script", "ledger.json", "--json"]));
    // Only the item's events are replayed; its registration is already stored.
    assert_eq!(stats["items_loaded"], 0);
    assert_eq!(stats["appended"], 0);
    assert_eq!(stats["duplicates"], 1);
}

#[test]
fn unknown_item_is_reported_with_code() {
    let dir = project();
    sync(dir.path());

    lot_cmd(dir.path())
        .args(["show", "99", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    lot_cmd(dir.path())
        .args(["resync", "99", "--script", "ledger.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the store"));
}

#[test]
fn read_commands_need_a_store() {
    let dir = project();
    lot_cmd(dir.path())
        .args(["list", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn malformed_config_is_reported_with_code() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".lotline")).expect("mkdir");
    std::fs::write(dir.path().join(".lotline/config.toml"), "[sync\n").expect("write config");

    lot_cmd(dir.path())
        .args(["sync", "--script", "ledger.json", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"))
        .stderr(predicate::str::contains("config.toml"));
    assert!(!dir.path().join(".lotline/store.json").exists());
}

#[test]
fn refused_script_step_fails_sync() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join("ledger.json"),
        r#"{ "ops": [ { "op": "inspect", "caller": "0x00000000000000000000000000000000000000b1", "item": 1 } ] }"#,
    )
    .expect("write script");

    lot_cmd(dir.path())
        .args(["sync", "--script", "ledger.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("script step 1"));
}
