use assert_cmd::Command;
use std::io::Write;

fn snapshots_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write snapshots");
    file
}

const TERMINAL_SNAPSHOTS: &str = r#"[
    {
        "tag": "button",
        "role": "button",
        "label": "Submit",
        "text": "Submit Order",
        "attributes": {}
    },
    {
        "tag": "input",
        "label": "Username",
        "placeholder": "Enter username",
        "attributes": {}
    },
    {
        "tag": "div",
        "test_id": "trade-panel",
        "text": "Trading Panel",
        "attributes": {}
    }
]"#;

#[test]
fn test_heal_suggests_stable_replacements() {
    let snapshots = snapshots_file(TERMINAL_SNAPSHOTS);

    let mut cmd = Command::cargo_bin("holdfast").unwrap();
    let assert = cmd
        .arg("heal")
        .arg(".submit-btn")
        .arg("--snapshots")
        .arg(snapshots.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Healing Suggestions"));
    assert!(stdout.contains("role+label"));
    assert!(stdout.contains("Confidence: 95%"));
    // The broken kind (css) must not be suggested back.
    assert!(!stdout.contains("css="));
}

#[test]
fn test_heal_min_confidence_filters_weak_suggestions() {
    let snapshots = snapshots_file(TERMINAL_SNAPSHOTS);

    let mut cmd = Command::cargo_bin("holdfast").unwrap();
    let assert = cmd
        .arg("heal")
        .arg("//div[3]")
        .arg("--snapshots")
        .arg(snapshots.path())
        .arg("--min-confidence")
        .arg("0.8")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("role+label"));
    assert!(!stdout.contains("text="));
}

#[test]
fn test_heal_no_snapshots_reports_nothing_found() {
    let snapshots = snapshots_file("[]");

    let mut cmd = Command::cargo_bin("holdfast").unwrap();
    let assert = cmd
        .arg("heal")
        .arg(".gone")
        .arg("--snapshots")
        .arg(snapshots.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("No healing suggestions found"));
}

#[test]
fn test_heal_rejects_invalid_snapshot_json() {
    let snapshots = snapshots_file("{ not json ]");

    let mut cmd = Command::cargo_bin("holdfast").unwrap();
    cmd.arg("heal")
        .arg(".x")
        .arg("--snapshots")
        .arg(snapshots.path())
        .assert()
        .failure();
}
