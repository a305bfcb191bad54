//! `kuby options ...` against an isolated options store.

use predicates::prelude::*;

use crate::kuby;

#[test]
fn add_then_list() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["options", "add", "frontend", "MM/DD/YYYY HH:mm:SS"])
        .assert()
        .success()
        .stderr(predicate::str::contains("saved format for 'frontend'"));
    kuby(home.path())
        .args(["options", "add", "backend", "YYYY-MM-DD HH:mm:SS.sss", "-m"])
        .assert()
        .success();

    kuby(home.path())
        .args(["options", "list"])
        .assert()
        .success()
        .stdout(
            "backend\tYYYY-MM-DD HH:mm:SS.sss\tmerge-identical-timestamps\n\
             frontend\tMM/DD/YYYY HH:mm:SS\n",
        );
}

#[test]
fn add_rejects_empty_format() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["options", "add", "frontend", "  "])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("please provide a format string"));

    kuby(home.path())
        .args(["options", "list"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn remove_missing_prefix_fails() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["options", "remove", "nothing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no rule for prefix 'nothing'"));
}

#[test]
fn remove_existing_rule() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["options", "add", "frontend", "HH:mm:SS"])
        .assert()
        .success();
    kuby(home.path())
        .args(["options", "remove", "frontend"])
        .assert()
        .success();
    kuby(home.path())
        .args(["options", "list"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn export_is_indented_json_array() {
    let home = tempfile::tempdir().unwrap();

    kuby(home.path())
        .args(["options", "add", "frontend", "MM/DD/YYYY HH:mm:SS"])
        .assert()
        .success();

    kuby(home.path())
        .args(["options", "export"])
        .assert()
        .success()
        .stdout(
            "[\n    {\n        \"prefix\": \"frontend\",\n        \"format\": \"MM/DD/YYYY HH:mm:SS\",\n        \"mergeIdenticalTimestamps\": false\n    }\n]\n",
        );
}

#[test]
fn import_replaces_rules_and_export_round_trips() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("rules.json");
    std::fs::write(
        &file,
        r#"[
            {"prefix": "api", "format": "YYYY-MM-DD HH:mm:SS", "mergeIdenticalTimestamps": true},
            {"prefix": "web", "format": "HH:mm:SS.sss"}
        ]"#,
    )
    .unwrap();

    kuby(home.path())
        .args(["options", "add", "stale", "HH:mm"])
        .assert()
        .success();
    kuby(home.path())
        .args(["options", "import"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("imported 2 rule(s)"));

    kuby(home.path())
        .args(["options", "list"])
        .assert()
        .success()
        .stdout("api\tYYYY-MM-DD HH:mm:SS\tmerge-identical-timestamps\nweb\tHH:mm:SS.sss\n");

    let exported = home.path().join("exported.json");
    kuby(home.path())
        .args(["options", "export", "-o"])
        .arg(&exported)
        .assert()
        .success();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(
        value,
        serde_json::json!([
            {"prefix": "api", "format": "YYYY-MM-DD HH:mm:SS", "mergeIdenticalTimestamps": true},
            {"prefix": "web", "format": "HH:mm:SS.sss", "mergeIdenticalTimestamps": false}
        ])
    );
}

#[test]
fn import_rejects_non_array() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("rules.json");
    std::fs::write(&file, r#"{"prefix": "api", "format": "HH:mm"}"#).unwrap();

    kuby(home.path())
        .args(["options", "import"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must contain an array"));
}

#[test]
fn import_rejects_entry_without_format() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("rules.json");
    std::fs::write(&file, r#"[{"prefix": "api"}]"#).unwrap();

    kuby(home.path())
        .args(["options", "import"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("prefix and format"));
}
