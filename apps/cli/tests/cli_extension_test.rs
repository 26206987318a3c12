//! Integration tests for the `parley extension` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn write(temp_dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = temp_dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_extension_validate_prints_normalized_definition() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = write(
        &temp_dir,
        "manifest.json",
        r#"{
            "definition": {"name": "Analytics", "menuText": "Stats"},
            "skills": [{"id": "track", "name": "Track"}],
            "translations": {"en": {"title": "Analytics"}}
        }"#,
    );

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extension 'Analytics' is valid"))
        .stdout(predicate::str::contains(r#""fullName": "Analytics""#))
        .stdout(predicate::str::contains(r#""menuIcon": "view_module""#))
        .stdout(predicate::str::contains(r#""menuText": "Stats""#))
        .stdout(predicate::str::contains("skills: 1"));
}

#[test]
fn test_extension_validate_reports_every_violation() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = write(
        &temp_dir,
        "manifest.json",
        r#"{
            "definition": {"name": "broken", "noInterface": "yes"},
            "onServerStarted": true,
            "colors": []
        }"#,
    );

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(&manifest)
        .assert()
        .failure()
        .stdout(predicate::str::contains("definition.noInterface"))
        .stdout(predicate::str::contains("must be a function"))
        .stdout(predicate::str::contains("is not allowed"))
        .stderr(predicate::str::contains("3 violation(s) found"));
}

#[test]
fn test_extension_validate_with_schema() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = write(&temp_dir, "manifest.json", r#"{"definition": {"name": "nlu"}}"#);
    let schema = write(&temp_dir, "config.schema.json", r#"{"properties": {}}"#);
    let bad_schema = write(&temp_dir, "bad.schema.json", "[]");

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(&manifest)
        .arg("--schema")
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration schema: yes"));

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(&manifest)
        .arg("--schema")
        .arg(&bad_schema)
        .assert()
        .failure()
        .stdout(predicate::str::contains("configSchema"));
}

#[test]
fn test_extension_validate_missing_file() {
    let temp_dir = TempDir::new().unwrap();

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(temp_dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_extension_validate_invalid_json() {
    let temp_dir = TempDir::new().unwrap();
    let manifest = write(&temp_dir, "manifest.json", "{ not json");

    Command::cargo_bin("parley")
        .unwrap()
        .args(["extension", "validate"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not valid JSON"));
}
