//! Scenario: CLI commands that never reach the registry.
//!
//! GREEN when:
//! - `config-hash` prints a stable hash and canonical JSON.
//! - `config-hash` refuses literal secrets without echoing them.
//! - `compare-csv` diffs two files offline.
//! - `sync` without credentials in the environment fails naming the
//!   missing variable, before any network call.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn dsync(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dsync").unwrap();
    cmd.current_dir(dir)
        .env_remove("DSYNC_EMAIL")
        .env_remove("DSYNC_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn config_hash_is_order_sensitive_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("base.yaml"), "registry:\n  page_size: 100\n").unwrap();
    std::fs::write(dir.path().join("env.yaml"), "registry:\n  page_size: 50\n").unwrap();

    let first = dsync(dir.path())
        .args(["config-hash", "base.yaml", "env.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("\"page_size\":50"))
        .get_output()
        .stdout
        .clone();

    let again = dsync(dir.path())
        .args(["config-hash", "base.yaml", "env.yaml"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(first, again);

    dsync(dir.path())
        .args(["config-hash", "env.yaml", "base.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"page_size\":100"));
}

#[test]
fn config_hash_rejects_literal_secrets() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.yaml"),
        "registry:\n  token: \"ghp_abcdefghijklmnop\"\n",
    )
    .unwrap();

    dsync(dir.path())
        .args(["config-hash", "bad.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("ghp_abcdefghijklmnop").not());
}

#[test]
fn compare_csv_reports_counts_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("src.csv"),
        "Phone Number,Branded Name\n(555) 111-1111,Acme\n5552222222,Beta\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("dst.csv"),
        "number,branded_name\n5552222222,Beta\n5553333333,Gamma\n",
    )
    .unwrap();

    dsync(dir.path())
        .args(["compare-csv", "--src", "src.csv", "--dst", "dst.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("source_count=2 export_count=2"))
        .stdout(predicate::str::contains("to_add=1 to_delete=1 mismatched=0"))
        .stdout(predicate::str::contains("5551111111 \"Acme\""))
        .stdout(predicate::str::contains("5553333333 \"Gamma\""));
}

#[test]
fn sync_without_credentials_names_the_missing_variable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("c.yaml"),
        "registry:\n  base_url: \"http://127.0.0.1:9\"\n  account_id: \"acc-1\"\n  org_id: \"org-1\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("src.csv"), "number\n5551111111\n").unwrap();

    dsync(dir.path())
        .args(["sync", "--config", "c.yaml", "--csv", "src.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("DSYNC_EMAIL"));
}
