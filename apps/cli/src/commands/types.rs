//! Command type definitions shared between main.rs and the command modules.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration of an extension
    Show {
        /// Extension name
        extension: String,

        /// Resolve for this bot
        #[arg(long)]
        bot: Option<String>,

        /// Skip the global file and environment overrides
        #[arg(long)]
        ignore_global: bool,
    },

    /// Write missing global configuration files
    ///
    /// Every extension shipping `assets/modules/<name>/config.schema.json`
    /// gets a `global/config/<name>.json` filled with its schema defaults.
    /// Existing files are never touched.
    Bootstrap,

    /// List the environment variables an extension reads
    Env {
        /// Extension name
        extension: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExtensionCommand {
    /// Validate an extension manifest and print its normalized definition
    Validate {
        /// Path to the manifest JSON file
        manifest: PathBuf,

        /// Configuration schema to validate along with the manifest
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}
