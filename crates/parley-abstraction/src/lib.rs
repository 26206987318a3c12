//! Collaborator contracts for the Parley extension runtime.
//!
//! The extension runtime never talks to storage, resource management or the
//! process lifecycle directly. It consumes the narrow traits defined here, so
//! the platform (or a test) decides what backs them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors raised by a [`ConfigStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file watcher could not be started or failed while running.
    #[error("Watch error: {0}")]
    Watch(String),

    /// An identifier could not be mapped to a storage path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Other store failures.
    #[error("Store error: {0}")]
    Other(String),
}

/// Versioned text store holding configuration files, scoped globally or per bot.
///
/// Files live at `config/<extension>.json` under the global scope and,
/// independently, under each bot's scope.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads the global configuration file of an extension.
    ///
    /// # Returns
    /// `Ok(None)` when the file does not exist.
    async fn read_global_file(&self, extension: &str) -> Result<Option<String>, StoreError>;

    /// Reads the bot-scoped configuration file of an extension.
    ///
    /// # Returns
    /// `Ok(None)` when the file does not exist.
    async fn read_bot_file(
        &self,
        extension: &str,
        bot_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Writes (creates or replaces) the global configuration file of an extension.
    async fn write_global_file(&self, extension: &str, content: &str) -> Result<(), StoreError>;

    /// Subscribes to change notifications. Each message is the changed file path.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Errors raised by a [`ResourceManager`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A resource operation failed for an extension.
    #[error("{operation} failed for extension '{extension}': {reason}")]
    Failed {
        /// Operation name (e.g. "migration").
        operation: String,
        /// Extension the operation ran for.
        extension: String,
        /// Failure description.
        reason: String,
    },

    /// Other resource failures.
    #[error("Resource error: {0}")]
    Other(String),
}

/// Manages the static assets, migrations and seed resources shipped by extensions.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Re-enables resources previously disabled for the extension.
    async fn enable_resources(&self, extension: &str) -> Result<(), ResourceError>;

    /// Disables every resource owned by the extension.
    async fn disable_resources(&self, extension: &str) -> Result<(), ResourceError>;

    /// Runs pending data migrations of the extension.
    async fn run_migrations(&self, extension: &str) -> Result<(), ResourceError>;

    /// Imports seed resources (actions, content types, hooks, assets).
    async fn import_resources(&self, extension: &str) -> Result<(), ResourceError>;
}

/// Stages of the process-wide readiness barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleStage {
    /// Global configuration has been loaded.
    ConfigurationLoaded,
    /// The database is reachable and migrated.
    DatabaseInitialized,
    /// The HTTP server accepts connections.
    HttpServerReady,
    /// Every extension has been notified that the server is ready.
    ModulesReady,
    /// The whole platform finished starting.
    PlatformReady,
}

impl LifecycleStage {
    /// All stages, in the order they are usually reached.
    pub const ALL: [Self; 5] = [
        Self::ConfigurationLoaded,
        Self::DatabaseInitialized,
        Self::HttpServerReady,
        Self::ModulesReady,
        Self::PlatformReady,
    ];

    /// Get the string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationLoaded => "configuration_loaded",
            Self::DatabaseInitialized => "database_initialized",
            Self::HttpServerReady => "http_server_ready",
            Self::ModulesReady => "modules_ready",
            Self::PlatformReady => "platform_ready",
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-stage barrier that independent subsystems wait on and signal.
#[async_trait]
pub trait ReadinessGate: Send + Sync {
    /// Resolves once `stage` has been signalled. Returns immediately if it already was.
    async fn wait_for(&self, stage: LifecycleStage);

    /// Signals `stage`. Signalling twice is harmless.
    fn set_done(&self, stage: LifecycleStage);

    /// Whether `stage` has been signalled.
    fn is_done(&self, stage: LifecycleStage) -> bool;
}

/// A dialog flow, as passed to `onFlowChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Flow name (e.g. `main.flow.json`).
    pub name: String,
    /// Optional storage location of the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Remaining flow content (nodes, links, ...), opaque to the runtime.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Flow {
    /// Create a flow with no content.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), location: None, content: Map::new() }
    }
}

/// A content element, as passed to `onElementChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentElement {
    /// Element id.
    pub id: String,
    /// Content type the element belongs to.
    pub content_type: String,
    /// Raw form data of the element.
    #[serde(default)]
    pub form_data: Value,
}

/// What happened to a content element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementChangedAction {
    /// The element was created.
    Create,
    /// The element was updated.
    Update,
    /// The element was deleted.
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_are_unique() {
        let mut names: Vec<_> = LifecycleStage::ALL.iter().map(LifecycleStage::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), LifecycleStage::ALL.len());
    }

    #[test]
    fn test_flow_keeps_unknown_fields() {
        let json = r#"{"name": "main.flow.json", "nodes": [], "startNode": "entry"}"#;
        let flow: Flow = serde_json::from_str(json).unwrap();
        assert_eq!(flow.name, "main.flow.json");
        assert_eq!(flow.content.get("startNode"), Some(&Value::from("entry")));
        assert!(flow.location.is_none());
    }

    #[test]
    fn test_content_element_camel_case() {
        let json = r#"{"id": "builtin_text-x1", "contentType": "builtin_text", "formData": {"text": "hi"}}"#;
        let element: ContentElement = serde_json::from_str(json).unwrap();
        assert_eq!(element.content_type, "builtin_text");
        assert_eq!(element.form_data["text"], "hi");
    }

    #[test]
    fn test_element_action_lowercase() {
        let action: ElementChangedAction = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(action, ElementChangedAction::Delete);
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::Failed {
            operation: "migration".to_string(),
            extension: "analytics".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "migration failed for extension 'analytics': disk full");
    }
}
