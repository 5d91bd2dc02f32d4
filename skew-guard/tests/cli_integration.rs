//! Integration tests for the `skew-guard` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const SPEC: &str = r#"{
  "keys": ["user_id"],
  "features": [
    {"name": "spend_7d", "kind": "numeric", "abs": 0.01, "rel": 0.01},
    {"name": "country", "kind": "categorical", "allowed": ["US", "UK"]}
  ]
}"#;

const OFFLINE: &str = r#"[
  {"user_id": 1, "spend_7d": 10.0, "country": "US"},
  {"user_id": 2, "spend_7d": 20.0, "country": "UK"}
]"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run_check(spec: &Path, offline: &Path, online: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skew-guard"))
        .arg("check")
        .arg("--spec")
        .arg(spec)
        .arg("--offline")
        .arg(offline)
        .arg("--online")
        .arg(online)
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_matching_dumps_exit_zero() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let offline = write(&dir, "offline.json", OFFLINE);
    let online = write(
        &dir,
        "online.jsonl",
        concat!(
            "{\"user_id\": 2, \"spend_7d\": 20.1, \"country\": \"UK\"}\n",
            "{\"user_id\": 1, \"spend_7d\": 10.0, \"country\": \"US\"}\n",
        ),
    );

    let output = run_check(&spec, &offline, &online, &[]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("OK: true"));
}

#[test]
fn test_skewed_dumps_exit_one_with_json_report() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let offline = write(&dir, "offline.json", OFFLINE);
    let online = write(
        &dir,
        "online.json",
        r#"[{"user_id": 1, "spend_7d": 12.0, "country": "FR"}]"#,
    );
    let report = dir.path().join("report.json");

    let output = run_check(
        &spec,
        &offline,
        &online,
        &["--format", "markdown", "--json", report.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1), "{output:?}");

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["missing_in_online"], 1);
    assert_eq!(json["missing_in_offline"], 0);
    assert_eq!(
        json["failing_features"],
        serde_json::json!(["spend_7d", "country"])
    );
    let country = json["features"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "country")
        .unwrap();
    assert_eq!(country["unknown_categories"], 1);
}

#[test]
fn test_csv_dumps_are_read_by_extension() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let offline = write(&dir, "offline.json", OFFLINE);
    let online = write(
        &dir,
        "online.csv",
        "user_id,spend_7d,country\n2,20.1,UK\n1,13.0,US\n",
    );

    let output = run_check(&spec, &offline, &online, &["--format", "json"]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["num_pairs"], 2);
    assert_eq!(json["failing_features"], serde_json::json!(["spend_7d"]));
}

#[test]
fn test_unreadable_tsv_exits_two() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let offline = write(&dir, "offline.json", OFFLINE);
    let online = dir.path().join("absent.tsv");

    let output = run_check(&spec, &offline, &online, &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("absent.tsv"), "{stderr}");
}

#[test]
fn test_invalid_spec_exits_two() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", r#"{"keys": [], "features": []}"#);
    let offline = write(&dir, "offline.json", OFFLINE);

    let output = run_check(&spec, &offline, &offline, &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error:"));
}

#[test]
fn test_strict_mode_rejects_absent_feature_column() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "spec.json", SPEC);
    let offline = write(&dir, "offline.json", OFFLINE);
    let online = write(
        &dir,
        "online.json",
        r#"[{"user_id": 1, "spend_7d": 10.0}, {"user_id": 2, "spend_7d": 20.0}]"#,
    );

    let lenient = run_check(&spec, &offline, &online, &["--format", "json"]);
    assert_eq!(lenient.status.code(), Some(1));

    let strict = run_check(&spec, &offline, &online, &["--strict"]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn test_version_subcommand() {
    let output = Command::new(env!("CARGO_BIN_EXE_skew-guard"))
        .arg("version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .starts_with("skew-guard "));
}
