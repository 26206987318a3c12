//! Shared fixtures for parley-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parley_abstraction::{ReadinessGate, ResourceError, ResourceManager};
use parley_core::config::{ConfigResolver, EnvSnapshot, ResolverOptions};
use parley_core::extensions::{
    ExtensionEntryPoint, ExtensionHooks, ExtensionRegistry, HookError, RegistryOptions,
    StaticLoader,
};
use parley_core::{AppLifecycle, MemoryConfigStore};
use parley_abstraction::LifecycleStage;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of everything hooks and resource managers were asked to do.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Resource manager recording every call, failing for selected extensions.
#[derive(Debug, Default)]
pub struct RecordingResources {
    pub log: CallLog,
    failing: Mutex<HashSet<String>>,
}

impl RecordingResources {
    pub fn new(log: CallLog) -> Self {
        Self { log, failing: Mutex::new(HashSet::new()) }
    }

    pub fn fail_migrations_for(&self, extension: &str) {
        self.failing.lock().unwrap().insert(extension.to_string());
    }
}

#[async_trait]
impl ResourceManager for RecordingResources {
    async fn enable_resources(&self, extension: &str) -> Result<(), ResourceError> {
        self.log.push(format!("{extension}:enable"));
        Ok(())
    }

    async fn disable_resources(&self, extension: &str) -> Result<(), ResourceError> {
        self.log.push(format!("{extension}:disable"));
        Ok(())
    }

    async fn run_migrations(&self, extension: &str) -> Result<(), ResourceError> {
        if self.failing.lock().unwrap().contains(extension) {
            return Err(ResourceError::Failed {
                operation: "migration".to_string(),
                extension: extension.to_string(),
                reason: "table already exists".to_string(),
            });
        }
        self.log.push(format!("{extension}:migrate"));
        Ok(())
    }

    async fn import_resources(&self, extension: &str) -> Result<(), ResourceError> {
        self.log.push(format!("{extension}:import"));
        Ok(())
    }
}

/// A registry wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemoryConfigStore>,
    pub resolver: Arc<ConfigResolver>,
    pub gate: Arc<AppLifecycle>,
    pub loader: Arc<StaticLoader>,
    pub resources: Arc<RecordingResources>,
    pub registry: Arc<ExtensionRegistry>,
    pub log: CallLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        let log = CallLog::default();
        let store = Arc::new(MemoryConfigStore::new());
        let resolver = Arc::new(
            ConfigResolver::new(store.clone(), EnvSnapshot::new(), ResolverOptions::default())
                .unwrap(),
        );
        let gate = Arc::new(AppLifecycle::new());
        let loader = Arc::new(StaticLoader::new());
        let resources = Arc::new(RecordingResources::new(log.clone()));
        let registry = Arc::new(
            ExtensionRegistry::new(
                resolver.clone(),
                resources.clone(),
                gate.clone(),
                loader.clone(),
                options,
            )
            .unwrap(),
        );

        Self { store, resolver, gate, loader, resources, registry, log }
    }

    /// Signals HTTP readiness and waits for the ready broadcast to finish.
    pub async fn finish_startup(&self) {
        self.gate.set_done(LifecycleStage::HttpServerReady);
        tokio::time::timeout(Duration::from_secs(5), self.gate.wait_for(LifecycleStage::ModulesReady))
            .await
            .expect("ready broadcast did not finish");
    }
}

pub fn manifest(name: &str) -> Value {
    json!({ "definition": { "name": name } })
}

/// Hooks recording `<name>:<hook>[:<bot>]` for every lifecycle point.
pub fn recording_hooks(name: &str, log: &CallLog) -> ExtensionHooks {
    let tag = |hook: &str| (format!("{name}:{hook}"), log.clone());

    let (started, started_log) = tag("onServerStarted");
    let (ready, ready_log) = tag("onServerReady");
    let (mount, mount_log) = tag("onBotMount");
    let (unmount, unmount_log) = tag("onBotUnmount");
    let (module_unmount, module_unmount_log) = tag("onModuleUnmount");
    let (topic, topic_log) = tag("onTopicChanged");
    let (flow, flow_log) = tag("onFlowChanged");
    let (renamed, renamed_log) = tag("onFlowRenamed");
    let (element, element_log) = tag("onElementChanged");

    ExtensionHooks::new()
        .on_server_started(move |_api| {
            started_log.push(started.clone());
            async { Ok::<(), HookError>(()) }
        })
        .on_server_ready(move |_api| {
            ready_log.push(ready.clone());
            async { Ok::<(), HookError>(()) }
        })
        .on_bot_mount(move |_api, bot_id| {
            mount_log.push(format!("{mount}:{bot_id}"));
            async { Ok::<(), HookError>(()) }
        })
        .on_bot_unmount(move |_api, bot_id| {
            unmount_log.push(format!("{unmount}:{bot_id}"));
            async { Ok::<(), HookError>(()) }
        })
        .on_module_unmount(move |_api| {
            module_unmount_log.push(module_unmount.clone());
            async { Ok::<(), HookError>(()) }
        })
        .on_topic_changed(move |_api, change| {
            topic_log.push(format!("{topic}:{}", change.bot_id));
            async { Ok::<(), HookError>(()) }
        })
        .on_flow_changed(move |_api, change| {
            flow_log.push(format!("{flow}:{}", change.bot_id));
            async { Ok::<(), HookError>(()) }
        })
        .on_flow_renamed(move |_api, change| {
            renamed_log.push(format!("{renamed}:{}", change.bot_id));
            async { Ok::<(), HookError>(()) }
        })
        .on_element_changed(move |_api, change| {
            element_log.push(format!("{element}:{}", change.bot_id));
            async { Ok::<(), HookError>(()) }
        })
}

/// Entry point with recording hooks.
pub fn recording_entry(name: &str, log: &CallLog) -> ExtensionEntryPoint {
    ExtensionEntryPoint::new(manifest(name)).with_hooks(recording_hooks(name, log))
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
