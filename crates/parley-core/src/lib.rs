//! Parley Core - extension runtime of the Parley bot platform.
//!
//! This crate provides:
//! - per-extension configuration resolution with caching and reactive
//!   invalidation ([`config`])
//! - descriptor validation, lifecycle hooks and the extension registry
//!   ([`extensions`])
//! - in-memory and filesystem configuration stores ([`storage`])
//! - an in-process readiness gate ([`readiness`])

pub mod config;
pub mod extensions;
pub mod json;
pub mod readiness;
pub mod storage;

pub use config::{
    CacheStats, ConfigError, ConfigKey, ConfigRecord, ConfigResolver, EnvSnapshot, EnvVariable,
    ResolverOptions,
};
pub use extensions::{
    ExtensionApi, ExtensionEntryPoint, ExtensionHooks, ExtensionRegistry, ExtensionState,
    HookError, HookFailure, RegistryError, RegistryOptions, ValidationError,
};
pub use readiness::AppLifecycle;
pub use storage::{FsConfigStore, MemoryConfigStore};
