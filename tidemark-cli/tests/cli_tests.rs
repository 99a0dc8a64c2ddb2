use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn tidemark_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tidemark"));
    cmd.env("NO_COLOR", "1").env("RUST_LOG", "warn");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run tidemark");
    assert!(
        output.status.success(),
        "tidemark failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn write_changes(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("changes.jsonl");
    let lines = [
        r#"# replayed from the carrier feed"#,
        r#"{"organization_id":"org-1","change_type":"field_update","entity_type":"deal","entity_id":"d-1","entity_title":"Acme renewal","diff":{"amount":{"from":1000,"to":1300}}}"#,
        r#"{"organization_id":"org-1","change_type":"field_update","entity_type":"deal","entity_id":"d-1","entity_title":"Acme renewal","diff":{"amount":{"to":1300,"from":1000}}}"#,
        "",
        r#"{"organization_id":"org-1","source":"vendor","change_type":"plan_change","entity_type":"member","entity_id":"m-7","diff":{"plan_id":{"from":"silver","to":"gold"}}}"#,
    ];
    fs::write(&path, lines.join("\n")).expect("write jsonl");
    path
}

#[test]
fn classify_termination_wins_over_status_change() {
    let out = json_stdout(tidemark_cmd().args([
        "classify",
        "--change-type",
        "member_termination",
        "--entity-type",
        "member",
        "--diff",
        r#"{"status":{"from":"active","to":"inactive"}}"#,
        "--json",
    ]));
    assert_eq!(out["rule"], "termination");
    assert_eq!(out["severity"], "critical");
    assert_eq!(out["requires_review"], true);
}

#[test]
fn classify_deal_amount_in_human_form() {
    tidemark_cmd()
        .args([
            "classify",
            "--change-type",
            "field_update",
            "--entity-type",
            "deal",
            "--diff",
            r#"{"amount":{"from":1000,"to":1300}}"#,
        ])
        .assert()
        .success()
        .stdout(contains("HIGH"))
        .stdout(contains("rule=significant_amount_change"))
        .stdout(contains("review=no"));
}

#[test]
fn classify_rejects_malformed_diff_argument() {
    tidemark_cmd()
        .args([
            "classify",
            "--change-type",
            "update",
            "--entity-type",
            "deal",
            "--diff",
            "[1, 2",
        ])
        .assert()
        .failure()
        .stderr(contains("--diff must be a JSON object"));
}

#[test]
fn config_file_overrides_amount_floor() {
    let tmp = TempDir::new().expect("tmp");
    let config = tmp.path().join("tidemark.yaml");
    fs::write(&config, "classifier:\n  amount_absolute_floor: 10\n").expect("write config");

    let diff = r#"{"amount":{"from":0,"to":50}}"#;
    let base = [
        "classify",
        "--change-type",
        "update",
        "--entity-type",
        "deal",
        "--diff",
        diff,
        "--json",
    ];

    let default_run = json_stdout(tidemark_cmd().args(base));
    assert_eq!(default_run["rule"], "default");

    let configured = json_stdout(
        tidemark_cmd()
            .arg("--config")
            .arg(&config)
            .args(base),
    );
    assert_eq!(configured["rule"], "significant_amount_change");
}

#[test]
fn rules_lists_table_in_order() {
    let out = json_stdout(tidemark_cmd().args(["rules", "--json"]));
    let rows = out.as_array().expect("array");
    assert_eq!(rows.len(), 17);
    assert_eq!(rows[0]["name"], "termination");
    assert_eq!(rows[16]["name"], "default");
    assert_eq!(rows[16]["severity"], "info");

    tidemark_cmd()
        .arg("rules")
        .assert()
        .success()
        .stdout(contains("sensitive_field_change"))
        .stdout(contains("First matching row wins."));
}

#[test]
fn ingest_dedups_and_continues_chains_across_runs() {
    let tmp = TempDir::new().expect("tmp");
    let changes = write_changes(tmp.path());
    let store = tmp.path().join("state").join("chains.json");

    let first = json_stdout(tidemark_cmd().arg("ingest").arg(&changes).arg("--chain-store").arg(&store).arg("--json"));
    assert_eq!(first["accepted"], 2);
    assert_eq!(first["duplicates"], 1);
    assert_eq!(first["emitted"], 2);
    assert_eq!(first["sync"]["pending"], 1);
    assert_eq!(first["sync"]["synced"], 1);
    assert!(store.exists());
    assert!(!store.with_extension("json.tmp").exists());

    let events = first["events"].as_array().expect("events");
    let deal = events
        .iter()
        .find(|e| e["entity_id"] == "d-1")
        .expect("deal event");
    assert_eq!(deal["severity"], "high");
    assert_eq!(deal["reconciliation_status"], "none");
    assert_eq!(deal["title"], "Acme renewal: amount 1000 → 1300");

    let second = json_stdout(tidemark_cmd().arg("ingest").arg(&changes).arg("--chain-store").arg(&store).arg("--json"));
    assert_eq!(second["accepted"], 0);
    assert_eq!(second["duplicates"], 3);
}

#[test]
fn ingest_table_output_and_severity_filter() {
    let tmp = TempDir::new().expect("tmp");
    let changes = write_changes(tmp.path());

    tidemark_cmd()
        .arg("ingest")
        .arg(&changes)
        .args(["--min-severity", "high"])
        .assert()
        .success()
        .stdout(contains("2 accepted | 1 duplicate(s) | 0 conflict(s)"))
        .stdout(contains("org-1/deal/d-1"))
        .stdout(contains("plan_change"));
}

#[test]
fn ingest_reports_line_of_invalid_input() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("bad.jsonl");
    fs::write(
        &path,
        "{\"organization_id\":\"org-1\",\"change_type\":\"x\",\"entity_type\":\"deal\",\"entity_id\":\"d-1\"}\n{\"organization_id\":\"org-1\"}\n",
    )
    .expect("write");

    tidemark_cmd()
        .arg("ingest")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("bad.jsonl:2: invalid change input"));
}
