//! Lifecycle hooks an extension may declare.
//!
//! Each capability is an optional async callable. Absence of a hook means
//! "nothing to do" at that lifecycle point, never an error.

use crate::config::{ConfigError, ConfigRecord, ConfigResolver};
use futures::future::BoxFuture;
use parley_abstraction::{ContentElement, ElementChangedAction, Flow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// HTTP context attached to a hook failure caused by an upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamContext {
    /// Response status, if a response was received.
    pub status: Option<u16>,
    /// Requested URL.
    pub url: String,
}

/// Errors returned by extension hooks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The hook reported a failure.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
        /// Upstream HTTP context, if the failure came from a remote call.
        upstream: Option<UpstreamContext>,
    },

    /// The hook did not complete in time.
    #[error("hook timed out after {0:?}")]
    TimedOut(Duration),
}

impl HookError {
    /// Create a failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into(), upstream: None }
    }

    /// Attach upstream HTTP context.
    #[must_use]
    pub fn with_upstream(self, status: Option<u16>, url: impl Into<String>) -> Self {
        match self {
            Self::Failed { message, .. } => {
                Self::Failed { message, upstream: Some(UpstreamContext { status, url: url.into() }) }
            }
            timed_out @ Self::TimedOut(_) => timed_out,
        }
    }

    /// Upstream HTTP context, if any.
    pub fn upstream(&self) -> Option<&UpstreamContext> {
        match self {
            Self::Failed { upstream, .. } => upstream.as_ref(),
            Self::TimedOut(_) => None,
        }
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<ConfigError> for HookError {
    fn from(error: ConfigError) -> Self {
        Self::new(error.to_string())
    }
}

/// Lifecycle point a hook runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPhase {
    /// Extension is being loaded.
    ServerStarted,
    /// HTTP server is ready.
    ServerReady,
    /// A bot is being mounted.
    BotMount,
    /// A bot is being unmounted.
    BotUnmount,
    /// The extension itself is being unloaded.
    ModuleUnmount,
    /// A topic was created, renamed or deleted.
    TopicChanged,
    /// A flow was saved.
    FlowChanged,
    /// A flow was renamed.
    FlowRenamed,
    /// A content element changed.
    ElementChanged,
}

impl HookPhase {
    /// All phases, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::ServerStarted,
        Self::ServerReady,
        Self::BotMount,
        Self::BotUnmount,
        Self::ModuleUnmount,
        Self::TopicChanged,
        Self::FlowChanged,
        Self::FlowRenamed,
        Self::ElementChanged,
    ];

    /// Name of the hook as it appears in extension manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerStarted => "onServerStarted",
            Self::ServerReady => "onServerReady",
            Self::BotMount => "onBotMount",
            Self::BotUnmount => "onBotUnmount",
            Self::ModuleUnmount => "onModuleUnmount",
            Self::TopicChanged => "onTopicChanged",
            Self::FlowChanged => "onFlowChanged",
            Self::FlowRenamed => "onFlowRenamed",
            Self::ElementChanged => "onElementChanged",
        }
    }

    /// Looks a phase up by its manifest name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle given to every hook invocation, scoped to one extension.
#[derive(Clone)]
pub struct ExtensionApi {
    extension: String,
    resolver: Arc<ConfigResolver>,
}

impl fmt::Debug for ExtensionApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionApi").field("extension", &self.extension).finish_non_exhaustive()
    }
}

impl ExtensionApi {
    /// Create a handle for `extension`.
    pub fn new(extension: impl Into<String>, resolver: Arc<ConfigResolver>) -> Self {
        Self { extension: extension.into(), resolver }
    }

    /// Lowercased name of the extension this handle belongs to.
    pub fn name(&self) -> &str {
        &self.extension
    }

    /// Effective configuration of the extension for a bot.
    pub async fn config(&self, bot_id: &str) -> Result<Arc<ConfigRecord>, ConfigError> {
        self.resolver.bot_config(&self.extension, bot_id).await
    }

    /// Effective configuration of the extension without bot overrides.
    pub async fn global_config(&self) -> Result<Arc<ConfigRecord>, ConfigError> {
        self.resolver.global_config(&self.extension).await
    }
}

/// Payload of `onTopicChanged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChange {
    /// Bot the topic belongs to.
    pub bot_id: String,
    /// Previous name, absent on creation.
    pub old_name: Option<String>,
    /// New name, absent on deletion.
    pub new_name: Option<String>,
}

/// Payload of `onFlowChanged`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowChange {
    /// Bot the flow belongs to.
    pub bot_id: String,
    /// Saved flow.
    pub flow: Flow,
}

/// Payload of `onFlowRenamed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRename {
    /// Bot the flow belongs to.
    pub bot_id: String,
    /// Name before the rename.
    pub previous_name: String,
    /// Name after the rename.
    pub new_name: String,
}

/// Payload of `onElementChanged`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementChange {
    /// Bot the element belongs to.
    pub bot_id: String,
    /// What happened.
    pub action: ElementChangedAction,
    /// Element after the change.
    pub element: ContentElement,
    /// Element before an update.
    pub old_element: Option<ContentElement>,
}

/// Future returned by every hook.
pub type HookFuture = BoxFuture<'static, Result<(), HookError>>;

/// Hook receiving only the extension handle.
pub type ServerHook = Arc<dyn Fn(ExtensionApi) -> HookFuture + Send + Sync>;

/// Hook receiving the extension handle and an event payload.
pub type EventHook<T> = Arc<dyn Fn(ExtensionApi, T) -> HookFuture + Send + Sync>;

/// The optional lifecycle hooks of an extension.
#[derive(Clone, Default)]
pub struct ExtensionHooks {
    /// Runs while the extension loads, before its resources are enabled.
    pub on_server_started: Option<ServerHook>,
    /// Runs once the HTTP server is ready.
    pub on_server_ready: Option<ServerHook>,
    /// Runs when a bot is mounted. Receives the bot id.
    pub on_bot_mount: Option<EventHook<String>>,
    /// Runs when a bot is unmounted. Receives the bot id.
    pub on_bot_unmount: Option<EventHook<String>>,
    /// Runs when the extension is unloaded.
    pub on_module_unmount: Option<ServerHook>,
    /// Runs when a topic changes.
    pub on_topic_changed: Option<EventHook<TopicChange>>,
    /// Runs when a flow is saved.
    pub on_flow_changed: Option<EventHook<FlowChange>>,
    /// Runs when a flow is renamed.
    pub on_flow_renamed: Option<EventHook<FlowRename>>,
    /// Runs when a content element changes.
    pub on_element_changed: Option<EventHook<ElementChange>>,
}

fn server_hook<F, Fut>(hook: F) -> ServerHook
where
    F: Fn(ExtensionApi) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(move |api| Box::pin(hook(api)))
}

fn event_hook<T, F, Fut>(hook: F) -> EventHook<T>
where
    T: Send + 'static,
    F: Fn(ExtensionApi, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(move |api, payload| Box::pin(hook(api, payload)))
}

impl ExtensionHooks {
    /// Create an empty hook table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `onServerStarted`.
    #[must_use]
    pub fn on_server_started<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_server_started = Some(server_hook(hook));
        self
    }

    /// Set `onServerReady`.
    #[must_use]
    pub fn on_server_ready<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_server_ready = Some(server_hook(hook));
        self
    }

    /// Set `onBotMount`.
    #[must_use]
    pub fn on_bot_mount<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_bot_mount = Some(event_hook(hook));
        self
    }

    /// Set `onBotUnmount`.
    #[must_use]
    pub fn on_bot_unmount<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_bot_unmount = Some(event_hook(hook));
        self
    }

    /// Set `onModuleUnmount`.
    #[must_use]
    pub fn on_module_unmount<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_module_unmount = Some(server_hook(hook));
        self
    }

    /// Set `onTopicChanged`.
    #[must_use]
    pub fn on_topic_changed<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, TopicChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_topic_changed = Some(event_hook(hook));
        self
    }

    /// Set `onFlowChanged`.
    #[must_use]
    pub fn on_flow_changed<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, FlowChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_flow_changed = Some(event_hook(hook));
        self
    }

    /// Set `onFlowRenamed`.
    #[must_use]
    pub fn on_flow_renamed<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, FlowRename) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_flow_renamed = Some(event_hook(hook));
        self
    }

    /// Set `onElementChanged`.
    #[must_use]
    pub fn on_element_changed<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionApi, ElementChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.on_element_changed = Some(event_hook(hook));
        self
    }

    /// Whether the hook for `phase` is declared.
    pub fn has(&self, phase: HookPhase) -> bool {
        match phase {
            HookPhase::ServerStarted => self.on_server_started.is_some(),
            HookPhase::ServerReady => self.on_server_ready.is_some(),
            HookPhase::BotMount => self.on_bot_mount.is_some(),
            HookPhase::BotUnmount => self.on_bot_unmount.is_some(),
            HookPhase::ModuleUnmount => self.on_module_unmount.is_some(),
            HookPhase::TopicChanged => self.on_topic_changed.is_some(),
            HookPhase::FlowChanged => self.on_flow_changed.is_some(),
            HookPhase::FlowRenamed => self.on_flow_renamed.is_some(),
            HookPhase::ElementChanged => self.on_element_changed.is_some(),
        }
    }

    /// Phases with a declared hook.
    pub fn declared(&self) -> Vec<HookPhase> {
        HookPhase::ALL.into_iter().filter(|phase| self.has(*phase)).collect()
    }
}

impl fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHooks").field("declared", &self.declared()).finish()
    }
}

/// Awaits a hook, failing with [`HookError::TimedOut`] past `timeout`.
pub(crate) async fn run_hook(future: HookFuture, timeout: Option<Duration>) -> Result<(), HookError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| HookError::TimedOut(limit))?,
        None => future.await,
    }
}
