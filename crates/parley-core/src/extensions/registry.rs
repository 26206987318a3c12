//! Extension registry.
//!
//! Owns the loaded extensions and drives their lifecycle:
//! - bulk loading at startup is best-effort, one broken extension never
//!   stops the others
//! - explicit reload and unload are strict and surface every failure
//! - per-bot events are fanned out to loaded extensions in registration order

use crate::config::ConfigResolver;
use crate::extensions::descriptor::{
    BotTemplate, DialogCondition, ExtensionDefinition, ExtensionDescriptor, ExtensionEntryPoint,
    FlowGenerator, SkillSummary,
};
use crate::extensions::error::{RegistryError, Result};
use crate::extensions::hooks::{
    ElementChange, EventHook, ExtensionApi, ExtensionHooks, FlowChange, FlowRename, HookError,
    HookFuture, HookPhase, TopicChange, run_hook,
};
use crate::extensions::lifecycle::{ExtensionLifecycle, ExtensionState};
use crate::extensions::loader::ExtensionLoader;
use crate::extensions::validator::process_entry_point;
use crate::json::deep_merge;
use parley_abstraction::{
    ContentElement, ElementChangedAction, Flow, LifecycleStage, ReadinessGate, ResourceError,
    ResourceManager,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

const MAX_HOOK_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Registry options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryOptions {
    /// Seconds a single hook may run before it fails. `0` disables the limit.
    #[serde(default = "default_hook_timeout_secs")]
    pub hook_timeout_secs: u64,
}

fn default_hook_timeout_secs() -> u64 {
    60
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self { hook_timeout_secs: default_hook_timeout_secs() }
    }
}

impl RegistryOptions {
    /// Hook timeout, `None` when disabled.
    pub fn hook_timeout(&self) -> Option<Duration> {
        (self.hook_timeout_secs > 0).then(|| Duration::from_secs(self.hook_timeout_secs))
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.hook_timeout_secs > MAX_HOOK_TIMEOUT_SECS {
            return Err(RegistryError::InvalidOptions(format!(
                "hook_timeout_secs must be at most {MAX_HOOK_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }
}

/// A registered extension.
#[derive(Debug)]
pub struct LoadedExtension {
    /// Lowercased name, the registry key.
    pub name: String,
    /// Absolute location it was loaded from, if loaded through the loader.
    pub location: Option<String>,
    /// Validated descriptor.
    pub descriptor: ExtensionDescriptor,
}

/// An extension listed in the host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredExtension {
    /// Location handed to the loader.
    pub location: String,
    /// Whether the host loads it at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ConfiguredExtension {
    /// An enabled extension at `location`.
    pub fn enabled(location: impl Into<String>) -> Self {
        Self { location: location.into(), enabled: true }
    }

    /// A disabled extension at `location`.
    pub fn disabled(location: impl Into<String>) -> Self {
        Self { location: location.into(), enabled: false }
    }
}

/// Catalog entry for an installed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    /// Package name, or the last segment of the location.
    pub name: String,
    /// Absolute location.
    pub location: String,
    /// Whether the host configuration enables it.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Current lifecycle state.
    pub state: ExtensionState,
}

/// A hook failure collected during a fan-out that does not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Extension whose hook failed.
    pub extension: String,
    /// Lifecycle point.
    pub phase: HookPhase,
    /// What went wrong.
    pub error: HookError,
}

/// Registry of loaded extensions.
pub struct ExtensionRegistry {
    resolver: Arc<ConfigResolver>,
    resources: Arc<dyn ResourceManager>,
    gate: Arc<dyn ReadinessGate>,
    loader: Arc<dyn ExtensionLoader>,
    options: RegistryOptions,
    /// Registration order is significant.
    extensions: RwLock<Vec<Arc<LoadedExtension>>>,
    /// Mount order is significant.
    mounted_bots: RwLock<Vec<String>>,
    lifecycle: ExtensionLifecycle,
    initialized: AtomicBool,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extension_count", &self.extensions.try_read().map(|e| e.len()).unwrap_or(0))
            .field("mounted_bots", &self.mounted_bots.try_read().map(|b| b.len()).unwrap_or(0))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    ///
    /// # Errors
    /// Returns `RegistryError::InvalidOptions` if the options are invalid.
    pub fn new(
        resolver: Arc<ConfigResolver>,
        resources: Arc<dyn ResourceManager>,
        gate: Arc<dyn ReadinessGate>,
        loader: Arc<dyn ExtensionLoader>,
        options: RegistryOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            resolver,
            resources,
            gate,
            loader,
            options,
            extensions: RwLock::new(Vec::new()),
            mounted_bots: RwLock::new(Vec::new()),
            lifecycle: ExtensionLifecycle::new(),
            initialized: AtomicBool::new(false),
            name_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The configuration resolver extensions read through.
    pub fn resolver(&self) -> &Arc<ConfigResolver> {
        &self.resolver
    }

    /// Handle passed to the hooks of `extension`.
    pub fn api(&self, extension: &str) -> ExtensionApi {
        ExtensionApi::new(extension.to_lowercase(), Arc::clone(&self.resolver))
    }

    /// Loads the startup set of extensions, in order.
    ///
    /// Missing global configuration files are bootstrapped first. An
    /// extension that fails validation, its start hook or its resource setup
    /// is logged and skipped. Once the HTTP server is ready, a background
    /// task runs the ready hook of every loaded extension and then signals
    /// [`LifecycleStage::ModulesReady`].
    ///
    /// # Returns
    /// Names of the extensions that loaded.
    ///
    /// # Errors
    /// Fails if called twice or if configuration bootstrapping fails.
    pub async fn load_extensions(
        self: &Arc<Self>,
        entries: Vec<ExtensionEntryPoint>,
    ) -> Result<Vec<String>> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::AlreadyInitialized);
        }

        for entry in &entries {
            if let Some(name) = entry.declared_name() {
                self.resolver.register_extension(name, entry.config_schema.clone());
            }
        }
        if let Err(e) = self.resolver.initialize().await {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        let mut loaded = Vec::new();
        for entry in &entries {
            let Some(name) = entry
                .declared_name()
                .map(str::to_lowercase)
                .filter(|name| !name.trim().is_empty())
            else {
                let reason = process_entry_point(entry, "")
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                error!(error = %reason, "Skipping extension without a name");
                continue;
            };

            match self.load_one(entry, &name, None).await {
                Ok(()) => loaded.push(name),
                Err(e) => error!(extension = %name, error = %e, "Extension failed to load, skipping it"),
            }
        }

        for name in &loaded {
            self.transition(name, ExtensionState::ReadyPending).await;
        }
        info!(loaded = loaded.len(), total = entries.len(), "Extensions loaded");

        let registry = Arc::clone(self);
        let names = loaded.clone();
        tokio::spawn(async move { registry.broadcast_ready(names).await });

        Ok(loaded)
    }

    async fn broadcast_ready(&self, names: Vec<String>) {
        self.gate.wait_for(LifecycleStage::HttpServerReady).await;

        for name in &names {
            let lock = self.name_lock(name).await;
            let _guard = lock.lock().await;

            let Some(extension) = self.get_extension(name).await else {
                warn!(extension = %name, "Extension skipped, it is no longer loaded");
                continue;
            };
            if self.lifecycle.get_state(name).await != ExtensionState::ReadyPending {
                continue;
            }

            if let Some(hook) = &extension.descriptor.hooks.on_server_ready {
                if let Err(e) = self.call(hook(self.api(name))).await {
                    warn!(
                        extension = %name,
                        phase = %HookPhase::ServerReady,
                        error = %e,
                        "Ready hook failed, extension will still be loaded"
                    );
                }
            }
            self.transition(name, ExtensionState::Ready).await;
        }

        self.gate.set_done(LifecycleStage::ModulesReady);
        info!(extensions = names.len(), "Extensions notified that the server is ready");
    }

    /// Asks the resource manager to disable the resources of extensions that
    /// are not loaded.
    pub async fn disable_resources(&self, names: &[String]) -> Result<()> {
        for name in names {
            let name = name.to_lowercase();
            self.resources
                .disable_resources(&name)
                .await
                .map_err(|source| RegistryError::Resources { extension: name.clone(), source })?;
        }
        Ok(())
    }

    /// Replaces the extension `name` with the one found at `location`.
    ///
    /// The current registration (if any) is fully unloaded before the new
    /// one loads. On success the ready hook runs, then the mount hook for
    /// every mounted bot. Reloads of the same name are serialized.
    ///
    /// A failing ready hook rolls the new registration back: its module
    /// unmount hook runs, its resources are disabled and it ends up
    /// `LoadFailed`.
    ///
    /// # Errors
    /// Every failure is returned, including hook failures.
    pub async fn reload_extension(&self, location: &str, name: &str) -> Result<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RegistryError::NotInitialized);
        }

        let name = name.to_lowercase();
        let lock = self.name_lock(&name).await;
        let _guard = lock.lock().await;

        let absolute = self.loader.resolve(location).await?;
        self.unload_locked(&absolute, &name).await?;

        let entry = self.loader.load(&absolute).await?;
        self.resolver.register_extension(&name, entry.config_schema.clone());
        self.resolver.ensure_global_file(&name).await?;
        self.load_one(&entry, &name, Some(absolute)).await?;

        let extension = self.extension(&name).await?;
        let api = self.api(&name);
        self.transition(&name, ExtensionState::ReadyPending).await;
        if let Some(hook) = &extension.descriptor.hooks.on_server_ready {
            if let Err(source) = self.call(hook(api.clone())).await {
                self.discard(&extension).await;
                return Err(hook_error(&name, HookPhase::ServerReady, source));
            }
        }
        self.transition(&name, ExtensionState::Ready).await;

        if let Some(hook) = &extension.descriptor.hooks.on_bot_mount {
            for bot_id in self.mounted_bots().await {
                self.call(hook(api.clone(), bot_id.clone())).await.map_err(|source| {
                    RegistryError::Mount { extension: name.clone(), bot_id, source }
                })?;
            }
        }

        info!(extension = %name, "Extension reloaded");
        Ok(())
    }

    /// Unloads the extension `name`, loaded from `location`.
    ///
    /// Runs the unmount hook for every mounted bot, then the module unmount
    /// hook, then disables its resources and forgets the cached artifact.
    ///
    /// # Returns
    /// `false` when nothing named `name` was loaded.
    pub async fn unload_extension(&self, location: &str, name: &str) -> Result<bool> {
        let name = name.to_lowercase();
        let lock = self.name_lock(&name).await;
        let _guard = lock.lock().await;
        self.unload_locked(location, &name).await
    }

    async fn unload_locked(&self, location: &str, name: &str) -> Result<bool> {
        let Some(extension) = self.get_extension(name).await else {
            debug!(extension = %name, "Extension not loaded, nothing to unload");
            return Ok(false);
        };

        let previous = self.lifecycle.get_state(name).await;
        self.transition(name, ExtensionState::Unloading).await;
        if let Err(e) = self.teardown(&extension).await {
            self.transition(name, previous).await;
            return Err(e);
        }

        self.extensions.write().await.retain(|loaded| !Arc::ptr_eq(loaded, &extension));
        self.loader.evict(location);
        if let Some(original) = extension.location.as_deref().filter(|l| *l != location) {
            self.loader.evict(original);
        }
        self.resolver.invalidate(name);
        self.transition(name, ExtensionState::Unloaded).await;

        info!(extension = %name, "Extension unloaded");
        Ok(true)
    }

    async fn teardown(&self, extension: &LoadedExtension) -> Result<()> {
        let name = extension.name.as_str();
        let api = self.api(name);
        let hooks = &extension.descriptor.hooks;

        if let Some(hook) = &hooks.on_bot_unmount {
            for bot_id in self.mounted_bots().await {
                self.call(hook(api.clone(), bot_id))
                    .await
                    .map_err(|source| hook_error(name, HookPhase::BotUnmount, source))?;
            }
        }
        if let Some(hook) = &hooks.on_module_unmount {
            self.call(hook(api.clone()))
                .await
                .map_err(|source| hook_error(name, HookPhase::ModuleUnmount, source))?;
        }

        self.resources
            .disable_resources(name)
            .await
            .map_err(|source| RegistryError::Resources { extension: name.to_string(), source })
    }

    /// Drops a registration that never became ready. Teardown problems are
    /// only logged.
    async fn discard(&self, extension: &Arc<LoadedExtension>) {
        let name = extension.name.as_str();
        self.transition(name, ExtensionState::Unloading).await;

        if let Some(hook) = &extension.descriptor.hooks.on_module_unmount {
            if let Err(e) = self.call(hook(self.api(name))).await {
                warn!(extension = %name, phase = %HookPhase::ModuleUnmount, error = %e, "Rollback hook failed");
            }
        }
        if let Err(e) = self.resources.disable_resources(name).await {
            warn!(extension = %name, error = %e, "Could not disable resources during rollback");
        }

        self.extensions.write().await.retain(|loaded| !Arc::ptr_eq(loaded, extension));
        if let Some(location) = extension.location.as_deref() {
            self.loader.evict(location);
        }
        self.resolver.invalidate(name);
        self.transition(name, ExtensionState::LoadFailed).await;
        warn!(extension = %name, "Extension rolled back after a failed reload");
    }

    async fn load_one(
        &self,
        entry: &ExtensionEntryPoint,
        name: &str,
        location: Option<String>,
    ) -> Result<()> {
        if self.get_extension(name).await.is_some() {
            return Err(RegistryError::AlreadyLoaded(name.to_string()));
        }

        self.transition(name, ExtensionState::Loading).await;
        match self.register(entry, name, location).await {
            Ok(()) => {
                self.transition(name, ExtensionState::Loaded).await;
                debug!(extension = %name, "Extension loaded");
                Ok(())
            }
            Err(e) => {
                self.transition(name, ExtensionState::LoadFailed).await;
                Err(e)
            }
        }
    }

    async fn register(
        &self,
        entry: &ExtensionEntryPoint,
        name: &str,
        location: Option<String>,
    ) -> Result<()> {
        let descriptor = process_entry_point(entry, name)?;

        if let Some(hook) = &descriptor.hooks.on_server_started {
            self.call(hook(self.api(name)))
                .await
                .map_err(|source| hook_error(name, HookPhase::ServerStarted, source))?;
        }

        let loaded = Arc::new(LoadedExtension { name: name.to_string(), location, descriptor });
        self.extensions.write().await.push(Arc::clone(&loaded));

        if let Err(source) = self.prepare_resources(name).await {
            self.extensions.write().await.retain(|other| !Arc::ptr_eq(other, &loaded));
            return Err(RegistryError::Resources { extension: name.to_string(), source });
        }
        Ok(())
    }

    async fn prepare_resources(&self, name: &str) -> std::result::Result<(), ResourceError> {
        self.resources.enable_resources(name).await?;
        self.resources.run_migrations(name).await?;
        self.resources.import_resources(name).await
    }

    /// Runs the mount hook of every extension for `bot_id`.
    ///
    /// # Errors
    /// The first failing hook aborts the loop; extensions registered after it
    /// are not called and the bot is not recorded as mounted.
    pub async fn on_bot_mount(&self, bot_id: &str) -> Result<()> {
        for extension in self.snapshot().await {
            if let Some(hook) = &extension.descriptor.hooks.on_bot_mount {
                self.call(hook(self.api(&extension.name), bot_id.to_string())).await.map_err(
                    |source| RegistryError::Mount {
                        extension: extension.name.clone(),
                        bot_id: bot_id.to_string(),
                        source,
                    },
                )?;
            }
        }

        let mut bots = self.mounted_bots.write().await;
        if !bots.iter().any(|bot| bot == bot_id) {
            bots.push(bot_id.to_string());
        }
        info!(bot_id = %bot_id, "Bot mounted in extensions");
        Ok(())
    }

    /// Runs the unmount hook of every extension for `bot_id`.
    ///
    /// Every extension is visited. The bot is no longer recorded as mounted
    /// afterwards, even if some hooks failed.
    pub async fn on_bot_unmount(&self, bot_id: &str) -> Vec<HookFailure> {
        let failures = self
            .fan_out(HookPhase::BotUnmount, |hooks| hooks.on_bot_unmount.as_ref(), bot_id.to_string())
            .await;
        self.mounted_bots.write().await.retain(|bot| bot != bot_id);
        failures
    }

    /// Notifies every extension that a topic changed.
    pub async fn on_topic_changed(
        &self,
        bot_id: &str,
        old_name: Option<&str>,
        new_name: Option<&str>,
    ) -> Vec<HookFailure> {
        let change = TopicChange {
            bot_id: bot_id.to_string(),
            old_name: old_name.map(str::to_string),
            new_name: new_name.map(str::to_string),
        };
        self.fan_out(HookPhase::TopicChanged, |hooks| hooks.on_topic_changed.as_ref(), change)
            .await
    }

    /// Notifies every extension that a flow was saved.
    pub async fn on_flow_changed(&self, bot_id: &str, flow: &Flow) -> Vec<HookFailure> {
        let change = FlowChange { bot_id: bot_id.to_string(), flow: flow.clone() };
        self.fan_out(HookPhase::FlowChanged, |hooks| hooks.on_flow_changed.as_ref(), change)
            .await
    }

    /// Notifies every extension that a flow was renamed.
    pub async fn on_flow_renamed(
        &self,
        bot_id: &str,
        previous_name: &str,
        new_name: &str,
    ) -> Vec<HookFailure> {
        let rename = FlowRename {
            bot_id: bot_id.to_string(),
            previous_name: previous_name.to_string(),
            new_name: new_name.to_string(),
        };
        self.fan_out(HookPhase::FlowRenamed, |hooks| hooks.on_flow_renamed.as_ref(), rename)
            .await
    }

    /// Notifies every extension that a content element changed.
    pub async fn on_element_changed(
        &self,
        bot_id: &str,
        action: ElementChangedAction,
        element: &ContentElement,
        old_element: Option<&ContentElement>,
    ) -> Vec<HookFailure> {
        let change = ElementChange {
            bot_id: bot_id.to_string(),
            action,
            element: element.clone(),
            old_element: old_element.cloned(),
        };
        self.fan_out(HookPhase::ElementChanged, |hooks| hooks.on_element_changed.as_ref(), change)
            .await
    }

    /// Calls the selected hook of every extension, collecting failures.
    async fn fan_out<T, S>(&self, phase: HookPhase, select: S, payload: T) -> Vec<HookFailure>
    where
        T: Clone + Send + 'static,
        S: Fn(&ExtensionHooks) -> Option<&EventHook<T>>,
    {
        let mut failures = Vec::new();
        for extension in self.snapshot().await {
            let Some(hook) = select(&extension.descriptor.hooks) else {
                continue;
            };
            if let Err(error) = self.call(hook(self.api(&extension.name), payload.clone())).await {
                warn!(extension = %extension.name, phase = %phase, error = %error, "Extension hook failed");
                failures.push(HookFailure { extension: extension.name.clone(), phase, error });
            }
        }
        failures
    }

    /// Every installed extension, sorted by name.
    ///
    /// The `configured` list comes first; locations the loader discovers on
    /// its own are appended as disabled. Entries are deduplicated by resolved
    /// location, and locations that cannot be resolved or described are left
    /// out.
    pub async fn all_extensions(&self, configured: &[ConfiguredExtension]) -> Vec<ExtensionInfo> {
        let discovered = self.loader.discover().await.into_iter().map(ConfiguredExtension::disabled);
        let candidates: Vec<ConfiguredExtension> = configured.iter().cloned().chain(discovered).collect();

        let mut catalog: Vec<ExtensionInfo> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let location = match self.loader.resolve(&candidate.location).await {
                Ok(location) => location,
                Err(e) => {
                    debug!(location = %candidate.location, error = %e, "Extension not listed");
                    continue;
                }
            };
            if catalog.iter().any(|info| info.location == location) {
                continue;
            }
            let package = match self.loader.describe(&location).await {
                Ok(package) => package,
                Err(e) => {
                    debug!(location = %location, error = %e, "Extension not listed");
                    continue;
                }
            };

            let name = package.name.unwrap_or_else(|| location_basename(&location));
            catalog.push(ExtensionInfo {
                state: self.state(&name).await,
                name,
                location,
                enabled: candidate.enabled,
                full_name: package.full_name,
                description: package.description,
                version: package.version,
            });
        }

        catalog.sort_by(|a, b| a.name.cmp(&b.name));
        catalog
    }

    /// Definitions of the loaded extensions, in registration order.
    pub async fn loaded_extensions(&self) -> Vec<ExtensionDefinition> {
        self.snapshot().await.iter().map(|e| e.descriptor.definition.clone()).collect()
    }

    /// Names of the loaded extensions, in registration order.
    pub async fn loaded_names(&self) -> Vec<String> {
        self.snapshot().await.iter().map(|e| e.name.clone()).collect()
    }

    /// Looks a loaded extension up by name, case-insensitively.
    pub async fn get_extension(&self, name: &str) -> Option<Arc<LoadedExtension>> {
        let name = name.to_lowercase();
        self.extensions.read().await.iter().find(|e| e.name == name).cloned()
    }

    /// Like [`Self::get_extension`], failing with `NotRegistered`.
    pub async fn extension(&self, name: &str) -> Result<Arc<LoadedExtension>> {
        self.get_extension(name)
            .await
            .ok_or_else(|| RegistryError::NotRegistered(name.to_lowercase()))
    }

    /// Every bot template, tagged with the extension providing it.
    pub async fn bot_templates(&self) -> Vec<BotTemplate> {
        self.snapshot()
            .await
            .iter()
            .flat_map(|extension| {
                let definition = &extension.descriptor.definition;
                extension.descriptor.bot_templates.iter().map(move |template| BotTemplate {
                    module_id: Some(definition.name.clone()),
                    module_name: Some(definition.full_name.clone()),
                    ..template.clone()
                })
            })
            .collect()
    }

    /// Every dialog condition, by display order. Conditions without an order
    /// come last.
    pub async fn dialog_conditions(&self) -> Vec<DialogCondition> {
        let mut conditions: Vec<DialogCondition> = self
            .snapshot()
            .await
            .iter()
            .flat_map(|extension| extension.descriptor.dialog_conditions.iter().cloned())
            .collect();
        conditions.sort_by_key(|condition| (condition.display_order.is_none(), condition.display_order));
        conditions
    }

    /// Every skill of every loaded extension.
    pub async fn skills(&self) -> Vec<SkillSummary> {
        self.snapshot()
            .await
            .iter()
            .flat_map(|extension| {
                let module_name = extension.descriptor.definition.name.clone();
                extension.descriptor.skills.iter().map(move |skill| SkillSummary {
                    id: skill.id.clone(),
                    name: skill.name.clone(),
                    icon: skill.icon.clone(),
                    module_name: module_name.clone(),
                })
            })
            .collect()
    }

    /// Flow generator of a skill.
    ///
    /// # Errors
    /// Fails with `NotRegistered` when the extension is not loaded.
    pub async fn flow_generator(
        &self,
        extension: &str,
        skill_id: &str,
    ) -> Result<Option<FlowGenerator>> {
        let extension = self.extension(extension).await?;
        Ok(extension
            .descriptor
            .skills
            .iter()
            .find(|skill| skill.id == skill_id)
            .and_then(|skill| skill.flow_generator.clone()))
    }

    /// Translations of every loaded extension, shaped as
    /// `{lang: {module: {<extension>: tree}}}`.
    pub async fn translations(&self) -> Value {
        let mut all = Value::Object(Map::new());
        for extension in self.snapshot().await {
            let name = &extension.descriptor.definition.name;
            for (lang, tree) in &extension.descriptor.translations {
                let mut by_extension = Map::new();
                by_extension.insert(name.clone(), tree.clone());
                let mut module = Map::new();
                module.insert("module".to_string(), Value::Object(by_extension));
                let mut by_lang = Map::new();
                by_lang.insert(lang.clone(), Value::Object(module));
                deep_merge(&mut all, Value::Object(by_lang));
            }
        }
        all
    }

    /// Lifecycle state of an extension.
    pub async fn state(&self, name: &str) -> ExtensionState {
        self.lifecycle.get_state(&name.to_lowercase()).await
    }

    /// Lifecycle state of every extension seen so far, sorted by name.
    pub async fn states(&self) -> Vec<(String, ExtensionState)> {
        self.lifecycle.snapshot().await
    }

    /// Mounted bots, in mount order.
    pub async fn mounted_bots(&self) -> Vec<String> {
        self.mounted_bots.read().await.clone()
    }

    async fn snapshot(&self) -> Vec<Arc<LoadedExtension>> {
        self.extensions.read().await.clone()
    }

    async fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.name_locks.lock().await;
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    async fn call(&self, hook: HookFuture) -> std::result::Result<(), HookError> {
        run_hook(hook, self.options.hook_timeout()).await
    }

    async fn transition(&self, name: &str, state: ExtensionState) {
        // Rejected transitions are logged by the tracker.
        let _ = self.lifecycle.set_state(name, state).await;
    }
}

fn location_basename(location: &str) -> String {
    location.rsplit(['/', '\\']).next().unwrap_or(location).to_string()
}

fn hook_error(extension: &str, phase: HookPhase, source: HookError) -> RegistryError {
    RegistryError::Hook { extension: extension.to_string(), phase, source }
}
