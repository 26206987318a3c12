//! Config command implementation.
//!
//! Resolves, bootstraps and documents extension configuration under a data
//! root laid out as `global/config`, `bots/<id>/config` and
//! `assets/modules/<name>/config.schema.json`.

use super::ConfigCommand;
use crate::CliContext;
use anyhow::Context;
use colored::Colorize;
use parley_core::config::{ConfigResolver, EnvSnapshot};
use parley_core::FsConfigStore;
use std::sync::Arc;
use tabled::{Table, Tabled, settings::Style};

/// Execute the config command.
pub async fn execute(command: ConfigCommand, ctx: &CliContext) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show { extension, bot, ignore_global } => {
            show_config(ctx, &extension, bot.as_deref(), ignore_global).await
        }
        ConfigCommand::Bootstrap => bootstrap(ctx).await,
        ConfigCommand::Env { extension, json } => list_env(ctx, &extension, json).await,
    }
}

/// Builds a resolver over the data root with every discovered schema registered.
async fn open_resolver(ctx: &CliContext) -> anyhow::Result<(Arc<ConfigResolver>, Vec<String>)> {
    let store = Arc::new(FsConfigStore::new(&ctx.root));
    let schemas = store
        .discover_schemas()
        .await
        .with_context(|| format!("failed to scan schemas under {}", store.root().display()))?;

    let resolver = Arc::new(ConfigResolver::new(
        store,
        EnvSnapshot::from_process(),
        ctx.settings.resolver.clone(),
    )?);
    let mut names = Vec::with_capacity(schemas.len());
    for (name, schema) in schemas {
        resolver.register_extension(&name, Some(schema));
        names.push(name);
    }
    Ok((resolver, names))
}

async fn show_config(
    ctx: &CliContext,
    extension: &str,
    bot: Option<&str>,
    ignore_global: bool,
) -> anyhow::Result<()> {
    let (resolver, known) = open_resolver(ctx).await?;
    let extension = extension.to_lowercase();
    if !known.contains(&extension) {
        eprintln!(
            "{}",
            format!("Extension '{extension}' ships no configuration schema, showing files only")
                .yellow()
        );
        resolver.register_extension(&extension, None);
    }

    let config = resolver.get(&extension, bot, ignore_global).await?;
    println!("{}", serde_json::to_string_pretty(&*config)?);
    Ok(())
}

async fn bootstrap(ctx: &CliContext) -> anyhow::Result<()> {
    let (resolver, known) = open_resolver(ctx).await?;
    if known.is_empty() {
        println!("{}", "No extension schemas found under assets/modules".yellow());
        return Ok(());
    }

    let created = resolver.initialize().await?;
    for name in &known {
        if created.contains(name) {
            println!("{} {}", "created".green(), format!("global/config/{name}.json").bold());
        } else {
            println!("{} {}", "kept   ".bright_black(), format!("global/config/{name}.json"));
        }
    }
    println!();
    println!("{} created, {} kept", created.len(), known.len() - created.len());
    Ok(())
}

#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "Option")]
    path: String,
    #[tabled(rename = "Variable")]
    name: String,
    #[tabled(rename = "Deprecated")]
    deprecated: String,
}

async fn list_env(ctx: &CliContext, extension: &str, json: bool) -> anyhow::Result<()> {
    let (resolver, _) = open_resolver(ctx).await?;
    let variables = resolver.env_variable_names(extension);

    if json {
        println!("{}", serde_json::to_string_pretty(&variables)?);
        return Ok(());
    }
    if variables.is_empty() {
        println!("{}", format!("No configuration options declared for '{extension}'").yellow());
        return Ok(());
    }

    let rows: Vec<EnvRow> = variables
        .into_iter()
        .map(|v| EnvRow {
            path: v.path,
            name: v.name,
            deprecated: v.deprecated.unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}
