//! Environment-derived configuration overrides.
//!
//! Every schema leaf `path` of extension `name` can be overridden by
//! `BP_MODULE_<NAME>_<PATH>`. Top-level options also honor the deprecated
//! `BP_<NAME>_<OPTION>` form.

use crate::config::schema::{leaf_paths, top_level_options};
use crate::json::set_path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::warn;

/// Prefix of namespaced variables.
pub const ENV_PREFIX: &str = "BP_MODULE_";

/// Prefix of the deprecated, non-namespaced variables.
pub const DEPRECATED_ENV_PREFIX: &str = "BP_";

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid sanitizer pattern"));

/// Snapshot of environment variables taken at construction time.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    /// Get a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Number of variables in the snapshot.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Environment variable names for one schema leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVariable {
    /// Dot-separated schema path.
    pub path: String,
    /// Namespaced variable name.
    pub name: String,
    /// Deprecated variable name, for top-level options only.
    pub deprecated: Option<String>,
}

/// Uppercases `segment` and collapses every run of characters outside
/// `[A-Za-z0-9_]` into a single underscore.
#[must_use]
pub fn sanitize(segment: &str) -> String {
    INVALID_CHARS.replace_all(&segment.to_uppercase(), "_").into_owned()
}

/// `BP_MODULE_<NAME>_<PATH>`
#[must_use]
pub fn variable_name(extension: &str, path: &str) -> String {
    format!("{ENV_PREFIX}{}_{}", sanitize(extension), sanitize(path))
}

/// `BP_<NAME>_<OPTION>`
#[must_use]
pub fn deprecated_variable_name(extension: &str, option: &str) -> String {
    format!("{DEPRECATED_ENV_PREFIX}{}_{}", sanitize(extension), sanitize(option))
}

/// Parses a variable value: booleans and numbers are coerced, anything else
/// stays a string.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    if let Some(number) = trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && !trimmed.is_empty())
        .and_then(Number::from_f64)
    {
        return Value::Number(number);
    }

    Value::String(raw.to_string())
}

/// Lists the variable names an extension's schema exposes.
#[must_use]
pub fn variables_for(extension: &str, schema: &Value) -> Vec<EnvVariable> {
    let top_level = top_level_options(schema);
    leaf_paths(schema)
        .into_iter()
        .map(|path| {
            let deprecated = top_level
                .iter()
                .any(|option| *option == path)
                .then(|| deprecated_variable_name(extension, &path));
            EnvVariable { name: variable_name(extension, &path), path, deprecated }
        })
        .collect()
}

/// Applies the environment overrides for `extension` onto `config`.
///
/// Deprecated variables are applied first so the namespaced form wins when
/// both are set.
///
/// # Returns
/// The number of variables applied.
pub fn apply_overrides(
    extension: &str,
    schema: &Value,
    env: &EnvSnapshot,
    config: &mut Map<String, Value>,
) -> usize {
    let mut applied = 0;

    for option in top_level_options(schema) {
        let old_name = deprecated_variable_name(extension, &option);
        if let Some(raw) = env.get(&old_name) {
            let new_name = variable_name(extension, &option);
            warn!(
                extension = %extension,
                old = %old_name,
                new = %new_name,
                "Deprecated environment variable in use, rename it to the namespaced form"
            );
            config.insert(option, parse_value(raw));
            applied += 1;
        }
    }

    for path in leaf_paths(schema) {
        if let Some(raw) = env.get(&variable_name(extension, &path)) {
            set_path(config, &path, parse_value(raw));
            applied += 1;
        }
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_variable_names() {
        assert_eq!(variable_name("foo", "timeout"), "BP_MODULE_FOO_TIMEOUT");
        assert_eq!(variable_name("channel-web", "auth.token"), "BP_MODULE_CHANNEL_WEB_AUTH_TOKEN");
        assert_eq!(variable_name("nlu", "a..b--c"), "BP_MODULE_NLU_A_B_C");
        assert_eq!(deprecated_variable_name("channel-web", "timeout"), "BP_CHANNEL_WEB_TIMEOUT");
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("30"), json!(30));
        assert_eq!(parse_value("-2"), json!(-2));
        assert_eq!(parse_value("0.5"), json!(0.5));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("false"), json!(false));
        assert_eq!(parse_value("hello"), json!("hello"));
        assert_eq!(parse_value(""), json!(""));
        assert_eq!(parse_value("NaN"), json!("NaN"));
        assert_eq!(parse_value("True"), json!("True"));
    }

    #[test]
    fn test_apply_overrides_nested_path() {
        let schema = json!({
            "properties": {
                "timeout": {"type": "number"},
                "auth": {"properties": {"token": {"type": "string"}}}
            }
        });
        let env: EnvSnapshot = [
            ("BP_MODULE_FOO_TIMEOUT", "30"),
            ("BP_MODULE_FOO_AUTH_TOKEN", "secret"),
            ("UNRELATED", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Map::new();
        config.insert("auth".to_string(), json!({"token": "x", "keep": true}));
        let applied = apply_overrides("foo", &schema, &env, &mut config);

        assert_eq!(applied, 2);
        assert_eq!(
            Value::Object(config),
            json!({"timeout": 30, "auth": {"token": "secret", "keep": true}})
        );
    }

    #[test]
    fn test_namespaced_variable_wins_over_deprecated() {
        let schema = json!({"properties": {"timeout": {"type": "number"}}});
        let env: EnvSnapshot =
            [("BP_FOO_TIMEOUT", "10"), ("BP_MODULE_FOO_TIMEOUT", "20")].into_iter().collect();

        let mut config = Map::new();
        apply_overrides("foo", &schema, &env, &mut config);
        assert_eq!(config["timeout"], json!(20));
    }

    #[test]
    fn test_deprecated_variable_alone() {
        let schema = json!({"properties": {"timeout": {"type": "number"}}});
        let env: EnvSnapshot = [("BP_FOO_TIMEOUT", "10")].into_iter().collect();

        let mut config = Map::new();
        assert_eq!(apply_overrides("foo", &schema, &env, &mut config), 1);
        assert_eq!(config["timeout"], json!(10));
    }

    #[test]
    fn test_variables_for_lists_deprecated_on_top_level_only() {
        let schema = json!({
            "properties": {
                "timeout": {"type": "number"},
                "auth": {"properties": {"token": {"type": "string"}}}
            }
        });
        let vars = variables_for("foo", &schema);
        let timeout = vars.iter().find(|v| v.path == "timeout").unwrap();
        assert_eq!(timeout.deprecated.as_deref(), Some("BP_FOO_TIMEOUT"));
        let token = vars.iter().find(|v| v.path == "auth.token").unwrap();
        assert_eq!(token.name, "BP_MODULE_FOO_AUTH_TOKEN");
        assert!(token.deprecated.is_none());
    }
}
