//! Parley CLI - operator commands for the Parley extension runtime
//!
//! This CLI provides a `parley` command for inspecting extension
//! configuration and validating extension manifests against a data root.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{ConfigCommand, ExtensionCommand};
use config::Settings;

/// Parley CLI - Extension runtime tooling
#[derive(Parser, Debug)]
#[command(
    name = "parley",
    author,
    version,
    about = "Parley - extension runtime tooling",
    long_about = "Parley resolves per-extension configuration (schema defaults, global file, environment, bot file)\nand validates extension manifests the way the runtime loads them."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Data root holding global/, bots/ and assets/
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Settings file (defaults to <root>/parley.toml when present)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and bootstrap extension configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Work with extension manifests
    #[command(subcommand)]
    Extension(ExtensionCommand),
}

/// Shared state handed to commands.
#[derive(Debug)]
pub struct CliContext {
    pub root: PathBuf,
    pub settings: Settings,
}

fn parse_level(level: &str) -> Level {
    match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load(args.settings.as_deref(), &args.root)?;
    let ctx = CliContext { root: args.root, settings };

    match args.command {
        Command::Config(cmd) => commands::config::execute(cmd, &ctx).await?,
        Command::Extension(cmd) => commands::extension::execute(cmd)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_level_falls_back_to_warn() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("loud"), Level::WARN);
    }
}
