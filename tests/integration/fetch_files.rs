//! Batch fetch over `<dir>/<source>.log` files.

use predicates::prelude::*;

use crate::{kuby, write_log};

#[test]
fn merges_sources_chronologically() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "api-1",
        "[2024-01-01T00:00:01Z] one\n[2024-01-01T00:00:03Z] three\n",
    );
    write_log(
        logs.path(),
        "db-0",
        "[2024-01-01T00:00:02Z] two\n[2024-01-01T00:00:04Z] four\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "api-1", "db-0"])
        .assert()
        .success()
        .stdout(
            "[00:00:01.000] [api] one\n\
             [00:00:02.000] [db] two\n\
             [00:00:03.000] [api] three\n\
             [00:00:04.000] [db] four\n",
        )
        .stderr(predicate::str::contains("4 of 4 entries from 2 source(s)"));
}

#[test]
fn single_source_keeps_continuations_without_tag() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "web-1",
        "[2024-01-01T10:00:00Z] Exception\n  at a()\n\n  at b()\n[2024-01-01T10:00:01Z] recovered\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1"])
        .assert()
        .success()
        .stdout(
            "[10:00:00.000] Exception\n  at a()\n  at b()\n\
             [10:00:01.000] recovered\n",
        );
}

#[test]
fn full_timestamps_across_days() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "web-1",
        "[2024-01-01T23:59:59Z] late\n[2024-01-02T00:00:01Z] early\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[2024-01-01 23:59:59.000] late"))
        .stdout(predicate::str::contains("[2024-01-02 00:00:01.000] early"));
}

#[test]
fn missing_source_is_reported_but_others_load() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:01Z] ok\n");

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "ghost-1", "web-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[web] ok"))
        .stderr(predicate::str::contains("failed: ghost-1"));
}

#[test]
fn all_sources_missing_fails() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "ghost-1"])
        .assert()
        .code(2)
        .stdout("")
        .stderr(predicate::str::contains("error fetching logs for ghost-1"));
}

#[test]
fn parse_errors_flag_the_source() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:02Z] fine\n");
    write_log(
        logs.path(),
        "legacy-1",
        "starting up\n[2024-01-01T00:00:01Z] ready\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1", "legacy-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[legacy] ready"))
        .stdout(predicate::str::contains("[legacy] starting up"))
        .stderr(predicate::str::contains("parsing errors: legacy-1"));
}

#[test]
fn search_and_time_range_filter_output() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "web-1",
        "[2024-01-01T10:00:00Z] GET /health\n\
         [2024-01-01T10:05:30Z] POST /login failed\n\
         [2024-01-01T10:05:45Z] GET /home\n\
         [2024-01-01T10:06:00Z] POST /login ok\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args([
            "fetch",
            "web-1",
            "--search",
            "POST",
            "--since",
            "2024-01-01T10:01",
            "--until",
            "2024-01-01T10:05",
        ])
        .assert()
        .success()
        .stdout("[10:05:30.000] POST /login failed\n")
        .stderr(predicate::str::contains("1 of 4 entries"));
}

#[test]
fn invalid_time_bound_is_a_config_error() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:01Z] ok\n");

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1", "--since", "yesterday"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid time 'yesterday'"));
}

#[test]
fn tail_limits_each_source() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "web-1",
        "[2024-01-01T00:00:01Z] a\n[2024-01-01T00:00:02Z] b\n[2024-01-01T00:00:03Z] c\n",
    );

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1", "--tail", "2"])
        .assert()
        .success()
        .stdout("[00:00:02.000] b\n[00:00:03.000] c\n");
}

#[test]
fn structured_format_from_options() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(
        logs.path(),
        "frontend-567f86d547-klmno",
        "[01/02/2024 03:04:06] User 1234 logged in\n",
    );
    write_log(
        logs.path(),
        "backend-76c47cfd56-pqrst",
        "[2024-01-02 03:04:05.500] Request processed in 123ms\n",
    );

    kuby(home.path())
        .args(["options", "add", "frontend", "MM/DD/YYYY HH:mm:SS"])
        .assert()
        .success();
    kuby(home.path())
        .args(["options", "add", "backend", "YYYY-MM-DD HH:mm:SS.sss"])
        .assert()
        .success();

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args([
            "fetch",
            "frontend-567f86d547-klmno",
            "backend-76c47cfd56-pqrst",
        ])
        .assert()
        .success()
        .stdout(
            "[03:04:05.500] [backend] [2024-01-02 03:04:05.500] Request processed in 123ms\n\
             [03:04:06.000] [frontend] [01/02/2024 03:04:06] User 1234 logged in\n",
        );
}

#[test]
fn export_writes_plain_text() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:01Z] hello\n");
    let export = home.path().join("export.txt");

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1", "--export"])
        .arg(&export)
        .assert()
        .success();

    let text = std::fs::read_to_string(&export).unwrap();
    assert_eq!(text, "[00:00:01.000] [web] hello");
}

#[test]
fn color_always_emits_ansi() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-1", "[2024-01-01T00:00:01Z] hello\n");

    let output = kuby(home.path())
        .arg("--color=always")
        .arg("--log-dir")
        .arg(logs.path())
        .args(["fetch", "web-1"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\x1b["), "expected ANSI escapes with --color=always");
    assert!(stdout.contains("hello"));
}

#[test]
fn pods_lists_log_files() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_log(logs.path(), "web-2", "");
    write_log(logs.path(), "api-1", "");
    write_log(logs.path(), "web-1", "");

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["pods", "web"])
        .assert()
        .success()
        .stdout("web-1\nweb-2\n");
}
