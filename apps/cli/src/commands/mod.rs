//! Command implementations for the Parley CLI.

pub mod config;
pub mod extension;
pub mod types;

pub use types::{ConfigCommand, ExtensionCommand};
