//! `kuby follow` over file sources.

use predicates::prelude::*;

use crate::kuby;

#[test]
fn missing_file_ends_the_session() {
    let home = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();

    kuby(home.path())
        .arg("--log-dir")
        .arg(logs.path())
        .args(["follow", "ghost-1"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("failed: ghost-1"))
        .stderr(predicate::str::contains("0 of 0 entries"));
}
