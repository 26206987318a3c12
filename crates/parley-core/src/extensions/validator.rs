//! Structural validation and normalization of extension entry points.
//!
//! Validation never stops at the first problem: every violated field is
//! reported so an extension author can fix them in one pass.

use crate::extensions::descriptor::{
    BotTemplate, DEFAULT_MENU_ICON, DialogCondition, ExtensionDefinition, ExtensionDescriptor,
    ExtensionEntryPoint, Skill,
};
use crate::extensions::hooks::HookPhase;
use crate::json::deep_merge;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

const MANIFEST_KEYS: [&str; 5] =
    ["definition", "skills", "translations", "botTemplates", "dialogConditions"];

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path of the field (empty for the manifest itself).
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "\"{}\" {}", self.path, self.message)
        }
    }
}

/// An entry point does not satisfy the descriptor contract.
#[derive(Debug, Clone, Error)]
#[error("{}invalid configuration: {}", extension_prefix(.extension), join_issues(.issues))]
pub struct ValidationError {
    /// Name the extension was loaded under.
    pub extension: String,
    /// Every violated field.
    pub issues: Vec<ValidationIssue>,
}

fn extension_prefix(extension: &str) -> String {
    if extension.is_empty() { String::new() } else { format!("extension \"{extension}\" has ") }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue { path: path.into(), message: message.into() });
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
struct SkillManifest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    icon: Option<String>,
}

/// Validates `entry` and applies the definition defaults.
///
/// `name` is only used to label errors.
///
/// # Errors
/// Returns a [`ValidationError`] listing every violated field.
pub fn process_entry_point(
    entry: &ExtensionEntryPoint,
    name: &str,
) -> Result<ExtensionDescriptor, ValidationError> {
    let mut issues = Issues::default();
    let empty = Map::new();
    let manifest = match &entry.manifest {
        Value::Object(manifest) => manifest,
        _ => {
            issues.push("", "manifest must be an object");
            &empty
        }
    };

    for key in manifest.keys() {
        if HookPhase::from_name(key).is_some() {
            issues.push(key.as_str(), "must be a function");
        } else if !MANIFEST_KEYS.contains(&key.as_str()) {
            issues.push(key.as_str(), "is not allowed");
        }
    }

    let definition = check_definition(manifest.get("definition"), &mut issues);

    let mut skills = manifest_skills(manifest.get("skills"), &mut issues);
    skills.extend(entry.skills.iter().cloned());
    for (index, skill) in skills.iter().enumerate() {
        if skill.id.trim().is_empty() {
            issues.push(format!("skills[{index}].id"), "is required");
        }
    }

    let translations = match manifest.get("translations") {
        None => Map::new(),
        Some(Value::Object(translations)) => translations.clone(),
        Some(_) => {
            issues.push("translations", "must be an object");
            Map::new()
        }
    };

    let bot_templates: Vec<BotTemplate> = typed_array(manifest, "botTemplates", &mut issues);
    let dialog_conditions: Vec<DialogCondition> =
        typed_array(manifest, "dialogConditions", &mut issues);

    if entry.config_schema.as_ref().is_some_and(|schema| !schema.is_object()) {
        issues.push("configSchema", "must be an object");
    }

    match definition {
        Some(definition) if issues.is_empty() => Ok(ExtensionDescriptor {
            definition,
            skills,
            translations,
            bot_templates,
            dialog_conditions,
            config_schema: entry.config_schema.clone(),
            hooks: entry.hooks.clone(),
        }),
        _ => Err(ValidationError { extension: name.to_string(), issues: issues.0 }),
    }
}

fn check_definition(value: Option<&Value>, issues: &mut Issues) -> Option<ExtensionDefinition> {
    let Some(value) = value else {
        issues.push("definition", "is required");
        return None;
    };
    let Value::Object(definition) = value else {
        issues.push("definition", "must be an object");
        return None;
    };

    let before = issues.len();
    for (key, field) in definition {
        let path = format!("definition.{key}");
        match key.as_str() {
            "name" => {}
            "fullName" | "menuIcon" | "menuText" | "homepage" => {
                if !field.is_string() {
                    issues.push(path, "must be a string");
                }
            }
            "noInterface" | "experimental" => {
                if !field.is_boolean() {
                    issues.push(path, "must be a boolean");
                }
            }
            "plugins" => {
                if !field.is_array() {
                    issues.push(path, "must be an array");
                }
            }
            "workspaceApp" => {
                if !field.is_object() {
                    issues.push(path, "must be an object");
                }
            }
            "moduleView" => check_module_view(field, &path, issues),
            _ => issues.push(path, "is not allowed"),
        }
    }

    let name = match definition.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => {
            issues.push("definition.name", "is not allowed to be empty");
            return None;
        }
        Some(_) => {
            issues.push("definition.name", "must be a string");
            return None;
        }
        None => {
            issues.push("definition.name", "is required");
            return None;
        }
    };
    if issues.len() > before {
        return None;
    }

    let mut normalized = json!({
        "fullName": name,
        "menuIcon": DEFAULT_MENU_ICON,
        "menuText": name,
        "moduleView": { "stretched": false },
        "noInterface": false,
        "plugins": [],
    });
    deep_merge(&mut normalized, value.clone());

    match serde_json::from_value(normalized) {
        Ok(definition) => Some(definition),
        Err(e) => {
            issues.push("definition", e.to_string());
            None
        }
    }
}

fn check_module_view(field: &Value, path: &str, issues: &mut Issues) {
    let Value::Object(view) = field else {
        issues.push(path, "must be an object");
        return;
    };
    for (key, value) in view {
        if key != "stretched" {
            issues.push(format!("{path}.{key}"), "is not allowed");
        } else if !value.is_boolean() {
            issues.push(format!("{path}.stretched"), "must be a boolean");
        }
    }
}

fn manifest_skills(value: Option<&Value>, issues: &mut Issues) -> Vec<Skill> {
    let parsed: Vec<SkillManifest> = match value {
        None => return Vec::new(),
        Some(value) => parse_array(value, "skills", issues),
    };
    parsed
        .into_iter()
        .map(|skill| Skill { id: skill.id, name: skill.name, icon: skill.icon, flow_generator: None })
        .collect()
}

fn typed_array<T: DeserializeOwned>(
    manifest: &Map<String, Value>,
    key: &str,
    issues: &mut Issues,
) -> Vec<T> {
    manifest.get(key).map(|value| parse_array(value, key, issues)).unwrap_or_default()
}

fn parse_array<T: DeserializeOwned>(value: &Value, key: &str, issues: &mut Issues) -> Vec<T> {
    let Value::Array(items) = value else {
        issues.push(key, "must be an array");
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value(item.clone()) {
            Ok(item) => parsed.push(item),
            Err(e) => issues.push(format!("{key}[{index}]"), e.to_string()),
        }
    }
    parsed
}
