//! Walking extension configuration schemas.
//!
//! Extensions declare their configuration as a JSON schema. Only inline
//! `properties` are followed; `$ref` targets are not resolved.

use serde_json::{Map, Value};

/// Key carrying the schema reference in synthesized global files.
pub const SCHEMA_REFERENCE_KEY: &str = "$schema";

/// Relative reference from `global/config/<name>.json` to the extension's schema.
#[must_use]
pub fn schema_reference(extension: &str) -> String {
    format!("../../assets/modules/{extension}/config.schema.json")
}

/// Synthesizes the minimal configuration object satisfying `schema`.
///
/// Properties with a declared `default` take it. Required properties without
/// one get the zero value of their type. Optional object properties are kept
/// only when something inside them has a default.
#[must_use]
pub fn schema_defaults(schema: &Value) -> Map<String, Value> {
    let mut defaults = Map::new();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return defaults;
    };
    let required = required_keys(schema);

    for (key, property) in properties {
        if let Some(default) = property.get("default") {
            defaults.insert(key.clone(), default.clone());
            continue;
        }

        let is_required = required.iter().any(|r| r == key);
        if has_properties(property) {
            let nested = schema_defaults(property);
            if is_required || !nested.is_empty() {
                defaults.insert(key.clone(), Value::Object(nested));
            }
        } else if is_required {
            defaults.insert(key.clone(), zero_value(property));
        }
    }

    defaults
}

/// Dot-separated paths of every leaf property, depth first, in declaration order.
#[must_use]
pub fn leaf_paths(schema: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaves(schema, "", &mut paths);
    paths
}

/// Names of the top-level properties.
#[must_use]
pub fn top_level_options(schema: &Value) -> Vec<String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| properties.keys().cloned().collect())
        .unwrap_or_default()
}

/// Builds the pretty-printed default global file for an extension.
///
/// Returns `None` when `schema` does not describe an object with properties,
/// in which case there is nothing worth writing.
#[must_use]
pub fn default_file_payload(extension: &str, schema: &Value) -> Option<String> {
    if !has_properties(schema) {
        return None;
    }

    let mut payload = Map::new();
    payload.insert(SCHEMA_REFERENCE_KEY.to_string(), Value::String(schema_reference(extension)));
    for (key, value) in schema_defaults(schema) {
        payload.insert(key, value);
    }

    serde_json::to_string_pretty(&Value::Object(payload)).ok()
}

fn collect_leaves(schema: &Value, prefix: &str, paths: &mut Vec<String>) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };

    for (key, property) in properties {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        if has_properties(property) {
            collect_leaves(property, &path, paths);
        } else {
            paths.push(path);
        }
    }
}

fn has_properties(schema: &Value) -> bool {
    schema.get("properties").is_some_and(Value::is_object)
}

fn required_keys(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// First non-null declared type of a property.
fn declared_type(property: &Value) -> Option<&str> {
    match property.get("type")? {
        Value::String(ty) => Some(ty.as_str()),
        Value::Array(types) => types.iter().filter_map(Value::as_str).find(|ty| *ty != "null"),
        _ => None,
    }
}

fn zero_value(property: &Value) -> Value {
    match declared_type(property) {
        Some("string") => Value::String(String::new()),
        Some("number" | "integer") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => Value::Object(schema_defaults(property)),
        _ => Value::Null,
    }
}
