// reportkeeper/tests/cli_integration_tests.rs
//! Command-line integration tests for the `reportkeeper` binary.
//!
//! These tests only exercise paths that never contact a portal or SMTP
//! server: help output, configuration discovery failures, and `--check`
//! validation of configuration files. `tempfile` keeps every test isolated.

use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

#[allow(unused_imports)]
use assert_cmd::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;

fn reportkeeper() -> Command {
    let mut cmd = Command::cargo_bin("reportkeeper").unwrap();
    // Make sure configuration discovery cannot pick up a real file.
    cmd.env_remove("REPORTKEEPER_CONFIG");
    cmd.current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn help_describes_the_automation_passes() {
    reportkeeper()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sequential identifiers"))
        .stdout(predicate::str::contains("--check"));
}

#[test]
fn missing_config_file_is_an_error() {
    reportkeeper()
        .args(["--config", "/definitely/not/there.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn check_accepts_a_valid_config() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(
        br#"
sequences:
  - name: CONCERN
    interval: 5
    next_value: 100
    pattern: "CID-{:04d}"
services: []
"#,
    )?;

    reportkeeper()
        .args(["--check", "--quiet", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
    Ok(())
}

#[test]
fn check_rejects_an_invalid_config() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(
        br#"
sequences:
  - name: CONCERN
    interval: 0
    next_value: 100
    pattern: "no placeholder"
"#,
    )?;

    reportkeeper()
        .args(["--check", "--quiet", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation failed"));
    Ok(())
}
