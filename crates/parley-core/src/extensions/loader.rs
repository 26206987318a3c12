//! Turning extension locations into entry points.
//!
//! The registry never knows how extension code is produced. It only asks a
//! loader to resolve a location, load the entry point found there, and forget
//! any cached artifact when the extension is unloaded.

use crate::extensions::descriptor::ExtensionEntryPoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

/// Loader errors.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Nothing is available at the location.
    #[error("no extension found at '{0}'")]
    NotFound(String),

    /// Something is there but cannot be turned into an entry point.
    #[error("invalid extension at '{location}': {reason}")]
    Invalid {
        /// Requested location.
        location: String,
        /// Why it is invalid.
        reason: String,
    },
}

/// Package metadata published by an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPackage {
    /// Package name.
    pub name: Option<String>,
    /// Human-readable name.
    pub full_name: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// Package version.
    pub version: Option<String>,
}

impl ExtensionPackage {
    /// Reads the metadata declared in a manifest's `definition`.
    pub fn from_manifest(manifest: &Value) -> Self {
        let field = |key: &str| {
            manifest
                .get("definition")
                .and_then(|definition| definition.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            name: field("name"),
            full_name: field("fullName"),
            description: field("description"),
            version: field("version"),
        }
    }
}

/// Resolves extension locations and produces their entry points.
#[async_trait]
pub trait ExtensionLoader: Send + Sync {
    /// Normalizes `location` into its absolute form.
    async fn resolve(&self, location: &str) -> Result<String, LoaderError>;

    /// Produces the entry point at an absolute location. May be cached.
    async fn load(&self, location: &str) -> Result<ExtensionEntryPoint, LoaderError>;

    /// Reads the package metadata at an absolute location without loading it.
    async fn describe(&self, location: &str) -> Result<ExtensionPackage, LoaderError>;

    /// Every location this loader knows about, installed or not.
    async fn discover(&self) -> Vec<String> {
        Vec::new()
    }

    /// Drops any cached artifact of `location`.
    fn evict(&self, location: &str);
}

/// Builds a fresh entry point.
pub type EntryPointFactory = Arc<dyn Fn() -> ExtensionEntryPoint + Send + Sync>;

/// Loader serving entry points compiled into the binary.
///
/// Locations are registered with a factory. The first load of a location
/// builds and caches its entry point until the location is evicted, so
/// replacing a factory only takes effect after an unload.
#[derive(Default)]
pub struct StaticLoader {
    factories: RwLock<HashMap<String, EntryPointFactory>>,
    loaded: RwLock<HashMap<String, ExtensionEntryPoint>>,
    builds: AtomicUsize,
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("locations", &self.locations())
            .field("builds", &self.builds())
            .finish_non_exhaustive()
    }
}

impl StaticLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory serving `location`.
    pub fn register<F>(&self, location: &str, factory: F)
    where
        F: Fn() -> ExtensionEntryPoint + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(location), Arc::new(factory));
    }

    /// Registered locations, sorted.
    pub fn locations(&self) -> Vec<String> {
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        let mut locations: Vec<String> = factories.keys().cloned().collect();
        locations.sort();
        locations
    }

    /// Number of entry points built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Whether an artifact is cached for `location`.
    pub fn is_cached(&self, location: &str) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize(location))
    }
}

fn normalize(location: &str) -> String {
    location.trim().trim_end_matches(['/', '\\']).to_string()
}

#[async_trait]
impl ExtensionLoader for StaticLoader {
    async fn resolve(&self, location: &str) -> Result<String, LoaderError> {
        let location = normalize(location);
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&location) {
            Ok(location)
        } else {
            Err(LoaderError::NotFound(location))
        }
    }

    async fn load(&self, location: &str) -> Result<ExtensionEntryPoint, LoaderError> {
        let location = normalize(location);
        if let Some(entry) =
            self.loaded.read().unwrap_or_else(PoisonError::into_inner).get(&location)
        {
            return Ok(entry.clone());
        }

        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&location)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(location.clone()))?;

        let entry = factory();
        self.builds.fetch_add(1, Ordering::SeqCst);
        debug!(location = %location, "Built extension entry point");

        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, entry.clone());
        Ok(entry)
    }

    async fn describe(&self, location: &str) -> Result<ExtensionPackage, LoaderError> {
        let location = normalize(location);
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&location)
            .cloned()
            .ok_or(LoaderError::NotFound(location))?;
        Ok(ExtensionPackage::from_manifest(&factory().manifest))
    }

    async fn discover(&self) -> Vec<String> {
        self.locations()
    }

    fn evict(&self, location: &str) {
        let location = normalize(location);
        if self.loaded.write().unwrap_or_else(PoisonError::into_inner).remove(&location).is_some() {
            debug!(location = %location, "Evicted cached extension entry point");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str) -> ExtensionEntryPoint {
        ExtensionEntryPoint::new(json!({"definition": {"name": name}}))
    }

    #[tokio::test]
    async fn test_resolve_normalizes_location() {
        let loader = StaticLoader::new();
        loader.register("modules/nlu", || entry("nlu"));

        assert_eq!(loader.resolve(" modules/nlu/ ").await.unwrap(), "modules/nlu");
        assert!(matches!(loader.resolve("modules/qna").await, Err(LoaderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_is_cached_until_evicted() {
        let loader = StaticLoader::new();
        loader.register("modules/nlu", || entry("nlu"));

        loader.load("modules/nlu").await.unwrap();
        loader.load("modules/nlu").await.unwrap();
        assert_eq!(loader.builds(), 1);
        assert!(loader.is_cached("modules/nlu"));

        loader.register("modules/nlu", || entry("nlu-v2"));
        let cached = loader.load("modules/nlu").await.unwrap();
        assert_eq!(cached.declared_name(), Some("nlu"));

        loader.evict("modules/nlu");
        let fresh = loader.load("modules/nlu").await.unwrap();
        assert_eq!(fresh.declared_name(), Some("nlu-v2"));
        assert_eq!(loader.builds(), 2);
    }

    #[tokio::test]
    async fn test_describe_does_not_build_or_cache() {
        let loader = StaticLoader::new();
        loader.register("modules/nlu", || {
            ExtensionEntryPoint::new(json!({
                "definition": {"name": "nlu", "fullName": "NLU", "version": "12.1.0"}
            }))
        });

        let package = loader.describe("modules/nlu/").await.unwrap();
        assert_eq!(package.name.as_deref(), Some("nlu"));
        assert_eq!(package.full_name.as_deref(), Some("NLU"));
        assert_eq!(package.version.as_deref(), Some("12.1.0"));
        assert!(package.description.is_none());
        assert_eq!(loader.builds(), 0);
        assert!(!loader.is_cached("modules/nlu"));

        assert!(matches!(loader.describe("modules/qna").await, Err(LoaderError::NotFound(_))));
        assert_eq!(loader.discover().await, vec!["modules/nlu"]);
    }
}
