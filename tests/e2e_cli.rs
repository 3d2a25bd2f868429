//! CLI end-to-end tests
//!
//! Tests for the rendition command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the rendition binary
#[allow(deprecated)]
fn rendition_cmd() -> Command {
    Command::cargo_bin("rendition").unwrap()
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("rendition.toml");
    fs::write(
        &path,
        format!(
            "data_dir = \"{}\"\n{}",
            dir.join("data").display(),
            extra
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = rendition_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = rendition_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rendition"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = rendition_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "[scheduler]\nmax_concurrent = 3\n");

    let mut cmd = rendition_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("3 concurrent"));
}

#[test]
fn test_cli_validate_rejects_odd_ladder() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "[renditions]\nladder = [481]\n");

    let mut cmd = rendition_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("481"));
}

#[test]
fn test_cli_jobs_empty_database() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = rendition_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("jobs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs"));

    assert!(dir.path().join("data/rendition.db").exists());
}

#[test]
fn test_cli_import_missing_file() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = rendition_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["import", "/no/such/clip.mp4", "--kind", "video"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source missing"));
}

#[test]
fn test_cli_retry_unknown_job() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = rendition_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["retry", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_reconcile_empty_database() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let mut cmd = rendition_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 marked transcoding, 0 marked completed"));
}

#[test]
fn test_cli_run_help() {
    let mut cmd = rendition_cmd();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the scheduler"));
}
