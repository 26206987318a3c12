//! Per-extension configuration resolution.
//!
//! # Data Flow
//! ```text
//! schema defaults
//!     ← global file     (config/<name>.json, global scope)
//!     ← environment     (BP_MODULE_<NAME>_<PATH>)
//!     ← bot file        (config/<name>.json, bot scope)
//!     → ConfigRecord    (cached per ConfigKey until invalidated)
//! ```

pub mod cache;
pub mod env;
pub mod resolver;
pub mod schema;

use parley_abstraction::StoreError;
use thiserror::Error;

pub use cache::{CacheStats, ConfigCache, ConfigKey, ConfigRecord};
pub use env::{EnvSnapshot, EnvVariable};
pub use resolver::{ConfigResolver, ResolverOptions, extract_extension_name};

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The global file exists but is not valid JSON.
    #[error("invalid global configuration for extension '{extension}': {source}")]
    Parse {
        /// Extension whose file is corrupt.
        extension: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The global file is valid JSON but not an object.
    #[error("global configuration of extension '{extension}' must be a JSON object")]
    NotAnObject {
        /// Extension whose file has the wrong shape.
        extension: String,
    },

    /// The configuration store failed.
    #[error("configuration store failed for extension '{extension}': {source}")]
    Store {
        /// Extension being resolved.
        extension: String,
        /// Store error.
        #[source]
        source: StoreError,
    },

    /// Resolver options are invalid.
    #[error("invalid resolver options: {0}")]
    InvalidOptions(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
