//! The kubectl backend, driven through a stub executable.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use predicates::prelude::*;

use crate::kuby;

/// Install `body` as an executable script and point the config at it.
fn install_stub(home: &Path, body: &str) -> PathBuf {
    let script = home.join("kubectl-stub");
    std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let dir = home.join("config").join("kuby");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        format!("kubectl = '{}'\n", script.display()),
    )
    .unwrap();
    script
}

#[test]
fn fetch_passes_namespace_and_tail() {
    let home = tempfile::tempdir().unwrap();
    install_stub(home.path(), "echo \"[2024-01-01T00:00:01Z] args $*\"\n");

    kuby(home.path())
        .args(["-n", "staging", "fetch", "web-1", "--tail", "5"])
        .assert()
        .success()
        .stdout("[00:00:01.000] args logs -n staging web-1 --tail=5\n");
}

#[test]
fn fetch_failure_surfaces_kubectl_stderr() {
    let home = tempfile::tempdir().unwrap();
    install_stub(
        home.path(),
        "echo 'Error from server (NotFound): pods \"web-1\" not found' >&2\nexit 1\n",
    );

    kuby(home.path())
        .args(["fetch", "web-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pods \"web-1\" not found"));
}

#[test]
fn follow_prints_until_the_stream_ends() {
    let home = tempfile::tempdir().unwrap();
    install_stub(
        home.path(),
        "echo \"[2024-01-01T00:00:01Z] args $*\"\n\
         echo '  continued'\n\
         echo '[2024-01-01T00:00:02Z] second'\n",
    );

    kuby(home.path())
        .args(["follow", "web-1"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[2024-01-01 00:00:01.000] args logs web-1 -f --tail=10",
        ))
        .stdout(predicate::str::contains("  continued"))
        .stdout(predicate::str::contains("[2024-01-01 00:00:02.000] second"))
        .stderr(predicate::str::contains("2 of 2 entries from 1 source(s)"));
}

#[test]
fn follow_failure_is_reported_per_source() {
    let home = tempfile::tempdir().unwrap();
    install_stub(
        home.path(),
        "echo 'Error from server (NotFound): pods \"web-1\" not found' >&2\nexit 1\n",
    );

    kuby(home.path())
        .args(["follow", "web-1"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains(
            "failed: web-1: Error from server (NotFound)",
        ))
        .stderr(predicate::str::contains("0 of 0 entries from 0 source(s)"));
}

#[test]
fn pods_lists_names_matching_prefix() {
    let home = tempfile::tempdir().unwrap();
    let script = install_stub(
        home.path(),
        "echo \"$*\" > \"$0.args\"\n\
         echo 'NAME                        READY   STATUS    RESTARTS   AGE'\n\
         echo 'frontend-567f86d547-klmno   1/1     Running   0          2d'\n\
         echo 'backend-76c47cfd56-pqrst    1/1     Running   0          2d'\n",
    );

    kuby(home.path())
        .args(["--context", "prod", "-n", "shop", "pods", "front"])
        .assert()
        .success()
        .stdout("frontend-567f86d547-klmno\n");

    let args = std::fs::read_to_string(format!("{}.args", script.display())).unwrap();
    assert_eq!(args.trim(), "--context prod get pods -n shop");
}

#[test]
fn contexts_marks_current() {
    let home = tempfile::tempdir().unwrap();
    install_stub(
        home.path(),
        "echo 'CURRENT   NAME      CLUSTER   AUTHINFO   NAMESPACE'\n\
         echo '*         prod      prod-c    admin      payments'\n\
         echo '          staging   stage-c   dev'\n",
    );

    kuby(home.path())
        .args(["contexts"])
        .assert()
        .success()
        .stdout("* prod\tpayments\n  staging\n");
}

#[test]
fn pods_failure_exits_with_backend_error() {
    let home = tempfile::tempdir().unwrap();
    install_stub(home.path(), "echo 'connection refused' >&2\nexit 1\n");

    kuby(home.path())
        .args(["pods"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("log backend error: connection refused"));
}
