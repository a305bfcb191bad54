//! Settings picked up from `$XDG_CONFIG_HOME/kuby/config.toml`.

use std::path::Path;

use predicates::prelude::*;

use crate::{kuby, write_log};

fn write_config(home: &Path, content: &str) {
    let dir = home.join("config").join("kuby");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
fn file_source_from_config() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:01Z] configured\n");
    write_config(
        home.path(),
        &format!("source = \"files\"\nlog_dir = '{}'\n", logs.path().display()),
    );

    kuby(home.path())
        .args(["fetch", "web-1"])
        .assert()
        .success()
        .stdout("[00:00:01.000] configured\n");
}

#[test]
fn tail_lines_from_config() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "web-1",
        "[2024-01-01T00:00:01Z] a\n[2024-01-01T00:00:02Z] b\n",
    );
    write_config(home.path(), "tail_lines = 1\n");

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1"])
        .assert()
        .success()
        .stdout("[00:00:02.000] b\n");
}

#[test]
fn files_source_without_dir_is_rejected() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["--source", "files", "fetch", "web-1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("needs a log directory"));
}

#[test]
fn unknown_time_zone_is_rejected() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["--timezone", "Mars/Olympus_Mons", "options", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown time zone 'Mars/Olympus_Mons'"));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .arg("--config")
        .arg(home.path().join("nope.toml"))
        .args(["options", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn completions_need_no_config() {
    let home = tempfile::tempdir().unwrap();
    write_config(home.path(), "source = \"bogus\"\n");

    kuby(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kuby"));
}
