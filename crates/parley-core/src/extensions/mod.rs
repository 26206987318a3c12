//! Extension runtime: descriptors, validation, hooks and the registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use parley_core::config::{ConfigResolver, EnvSnapshot, ResolverOptions};
//! use parley_core::extensions::{
//!     ExtensionEntryPoint, ExtensionHooks, ExtensionRegistry, HookError, NoopResourceManager,
//!     RegistryOptions, StaticLoader,
//! };
//! use parley_core::{AppLifecycle, MemoryConfigStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Arc::new(ConfigResolver::new(
//!     Arc::new(MemoryConfigStore::new()),
//!     EnvSnapshot::from_process(),
//!     ResolverOptions::default(),
//! )?);
//! let registry = Arc::new(ExtensionRegistry::new(
//!     resolver,
//!     Arc::new(NoopResourceManager),
//!     Arc::new(AppLifecycle::new()),
//!     Arc::new(StaticLoader::new()),
//!     RegistryOptions::default(),
//! )?);
//!
//! let analytics = ExtensionEntryPoint::new(json!({"definition": {"name": "analytics"}}))
//!     .with_hooks(ExtensionHooks::new().on_bot_mount(|api, bot_id| async move {
//!         let config = api.config(&bot_id).await?;
//!         tracing::info!(?config, "analytics mounted");
//!         Ok::<(), HookError>(())
//!     }));
//!
//! let loaded = registry.load_extensions(vec![analytics]).await?;
//! registry.on_bot_mount("welcome-bot").await?;
//! # let _ = loaded;
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod resources;
pub mod validator;

pub use descriptor::{
    BotTemplate, DialogCondition, ExtensionDefinition, ExtensionDescriptor, ExtensionEntryPoint,
    FlowGenerator, ModuleView, Skill, SkillSummary,
};
pub use error::{RegistryError, Result};
pub use hooks::{
    ElementChange, ExtensionApi, ExtensionHooks, FlowChange, FlowRename, HookError, HookPhase,
    TopicChange, UpstreamContext,
};
pub use lifecycle::{ExtensionLifecycle, ExtensionState};
pub use loader::{ExtensionLoader, ExtensionPackage, LoaderError, StaticLoader};
pub use registry::{
    ConfiguredExtension, ExtensionInfo, ExtensionRegistry, HookFailure, LoadedExtension,
    RegistryOptions,
};
pub use resources::NoopResourceManager;
pub use validator::{ValidationError, ValidationIssue, process_entry_point};
