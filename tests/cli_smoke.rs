//! Behavioural smoke tests for the `purefa-provider` binary. None of these
//! reach an array: they cover the offline commands and the checks that run
//! before a connection is attempted.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path.to_str().expect("UTF-8 temp path").to_owned()
}

#[test]
fn schema_prints_every_resource_type() {
    let mut cmd = cargo_bin_cmd!("purefa-provider");
    cmd.arg("schema");

    cmd.assert()
        .success()
        .stdout(contains("purefa_volume"))
        .stdout(contains("purefa_flasharray"));
}

#[test]
fn missing_subcommand_prints_help_and_fails() {
    let mut cmd = cargo_bin_cmd!("purefa-provider");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn plan_reports_replacement_for_a_new_email() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_file(&dir, "config.json", r#"{"email": "noc@example.com"}"#);
    let state = write_file(
        &dir,
        "state.json",
        r#"{"id": "ops@example.com", "attributes": {"email": "ops@example.com", "enabled": true}}"#,
    );

    let mut cmd = cargo_bin_cmd!("purefa-provider");
    cmd.args([
        "plan",
        "purefa_alert_recipient",
        "--config",
        config.as_str(),
        "--state",
        state.as_str(),
    ]);

    cmd.assert()
        .success()
        .stdout(contains(r#""action": "replace""#))
        .stdout(contains("email"));
}

#[test]
fn create_rejects_invalid_blocks_without_a_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_file(&dir, "config.json", r#"{"name": "vol-a", "size": 12}"#);

    let mut cmd = cargo_bin_cmd!("purefa-provider");
    cmd.env_remove("PURE_TARGET");
    cmd.args(["create", "purefa_volume", "--config", config.as_str()]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("size"));
}

#[test]
fn janitor_refuses_a_blank_prefix() {
    let mut cmd = cargo_bin_cmd!("purefa-janitor");
    cmd.args(["--prefix", "   "]);

    cmd.assert().failure().stderr(contains("prefix"));
}
