//! Integration tests for the `parley config` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_schema(root: &Path, extension: &str, schema: &str) {
    let dir = root.join("assets").join("modules").join(extension);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.schema.json"), schema).unwrap();
}

/// Data root with one extension shipping a schema.
fn data_root() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_schema(
        temp_dir.path(),
        "analytics",
        r#"{
            "type": "object",
            "properties": {
                "interval": {"type": "string", "default": "1h"},
                "retention": {"type": "integer", "default": 30}
            }
        }"#,
    );
    temp_dir
}

fn parley(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("parley").unwrap();
    cmd.arg("--root").arg(root).env_remove("BP_MODULE_ANALYTICS_RETENTION");
    cmd
}

#[test]
fn test_config_bootstrap_creates_then_keeps() {
    let temp_dir = data_root();

    parley(temp_dir.path())
        .args(["config", "bootstrap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"))
        .stdout(predicate::str::contains("global/config/analytics.json"));

    let written = fs::read_to_string(temp_dir.path().join("global/config/analytics.json")).unwrap();
    assert!(written.contains("../../assets/modules/analytics/config.schema.json"));
    assert!(written.contains("\"1h\""));

    parley(temp_dir.path())
        .args(["config", "bootstrap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 created, 1 kept"));
}

#[test]
fn test_config_bootstrap_without_schemas() {
    let temp_dir = TempDir::new().unwrap();
    parley(temp_dir.path())
        .args(["config", "bootstrap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No extension schemas found"));
}

#[test]
fn test_config_show_merges_tiers() {
    let temp_dir = data_root();
    let global = temp_dir.path().join("global/config");
    fs::create_dir_all(&global).unwrap();
    fs::write(global.join("analytics.json"), r#"{"interval": "5m"}"#).unwrap();
    let bot = temp_dir.path().join("bots/welcome-bot/config");
    fs::create_dir_all(&bot).unwrap();
    fs::write(bot.join("analytics.json"), r#"{"retention": 7}"#).unwrap();

    parley(temp_dir.path())
        .args(["config", "show", "analytics"])
        .env("BP_MODULE_ANALYTICS_RETENTION", "90")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""interval": "5m""#))
        .stdout(predicate::str::contains(r#""retention": 90"#))
        .stdout(predicate::str::contains("$schema").not());

    parley(temp_dir.path())
        .args(["config", "show", "analytics", "--bot", "welcome-bot"])
        .env("BP_MODULE_ANALYTICS_RETENTION", "90")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""retention": 7"#));

    parley(temp_dir.path())
        .args(["config", "show", "analytics", "--ignore-global"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""interval": "1h""#));
}

#[test]
fn test_config_show_corrupt_global_file_fails() {
    let temp_dir = data_root();
    let global = temp_dir.path().join("global/config");
    fs::create_dir_all(&global).unwrap();
    fs::write(global.join("analytics.json"), "{ nope").unwrap();

    parley(temp_dir.path())
        .args(["config", "show", "analytics"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid global configuration"));
}

#[test]
fn test_config_show_without_schema() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global/config");
    fs::create_dir_all(&global).unwrap();
    fs::write(global.join("legacy.json"), r#"{"enabled": true}"#).unwrap();

    parley(temp_dir.path())
        .args(["config", "show", "Legacy"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""enabled": true"#))
        .stderr(predicate::str::contains("ships no configuration schema"));
}

#[test]
fn test_config_env_lists_variables() {
    let temp_dir = data_root();

    parley(temp_dir.path())
        .args(["config", "env", "analytics"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BP_MODULE_ANALYTICS_INTERVAL"))
        .stdout(predicate::str::contains("BP_ANALYTICS_RETENTION"));

    parley(temp_dir.path())
        .args(["config", "env", "analytics", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "BP_MODULE_ANALYTICS_RETENTION""#));

    parley(temp_dir.path())
        .args(["config", "env", "unknown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No configuration options declared"));
}

#[test]
fn test_invalid_settings_file_fails() {
    let temp_dir = data_root();
    fs::write(temp_dir.path().join("parley.toml"), "[resolver]\ncache_capacity = 0\n").unwrap();

    parley(temp_dir.path())
        .args(["config", "show", "analytics"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache_capacity"));
}
