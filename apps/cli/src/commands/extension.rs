//! Extension command implementation.

use super::ExtensionCommand;
use anyhow::{Context, bail};
use colored::Colorize;
use parley_core::extensions::{ExtensionEntryPoint, process_entry_point};
use serde_json::Value;
use std::path::Path;

/// Execute the extension command.
pub fn execute(command: ExtensionCommand) -> anyhow::Result<()> {
    match command {
        ExtensionCommand::Validate { manifest, schema } => {
            validate_manifest(&manifest, schema.as_deref())
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn validate_manifest(manifest_path: &Path, schema_path: Option<&Path>) -> anyhow::Result<()> {
    let mut entry = ExtensionEntryPoint::new(read_json(manifest_path)?);
    if let Some(path) = schema_path {
        entry = entry.with_config_schema(read_json(path)?);
    }

    let name = entry.declared_name().map(str::to_lowercase).unwrap_or_default();
    let descriptor = match process_entry_point(&entry, &name) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            println!("{}", format!("✗ {} is not a valid extension manifest", manifest_path.display()).red());
            for issue in &e.issues {
                println!("  • {issue}");
            }
            bail!("{} violation(s) found", e.issues.len());
        }
    };

    println!("{}", format!("✓ Extension '{}' is valid", descriptor.definition.name).green());
    println!("{}", serde_json::to_string_pretty(&descriptor.definition)?);

    let summary = [
        ("skills", descriptor.skills.len()),
        ("bot templates", descriptor.bot_templates.len()),
        ("dialog conditions", descriptor.dialog_conditions.len()),
        ("languages", descriptor.translations.len()),
    ];
    for (label, count) in summary {
        if count > 0 {
            println!("  {}: {}", label, count.to_string().bright_black());
        }
    }
    if descriptor.config_schema.is_some() {
        println!("  {}", "configuration schema: yes".bright_black());
    }
    Ok(())
}
