//! Four-tier configuration resolver with reactive cache invalidation.

use crate::config::cache::{CacheStats, ConfigCache, ConfigKey, ConfigRecord};
use crate::config::env::{self, EnvSnapshot, EnvVariable};
use crate::config::schema::{SCHEMA_REFERENCE_KEY, default_file_payload, schema_defaults};
use crate::config::{ConfigError, Result};
use crate::json::merge_top_level;
use once_cell::sync::Lazy;
use parley_abstraction::ConfigStore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static CONFIG_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[/\\])config[/\\]([^/\\]+)\.json$").expect("valid config path pattern")
});

/// Extracts the extension name from a changed configuration path such as
/// `bots/welcome-bot/config/analytics.json`.
#[must_use]
pub fn extract_extension_name(path: &str) -> Option<String> {
    CONFIG_PATH
        .captures(path)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_lowercase())
}

/// Resolver options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Maximum number of cached configuration records.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { cache_capacity: default_cache_capacity() }
    }
}

impl ResolverOptions {
    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidOptions(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Computes and caches the effective configuration of extensions.
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    env: EnvSnapshot,
    schemas: RwLock<HashMap<String, Option<Value>>>,
    cache: Mutex<ConfigCache>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("extensions", &self.known_extensions())
            .field("cache", &self.cache_stats())
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Creates a resolver reading files from `store` and overrides from `env`.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidOptions` if the options are invalid.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        env: EnvSnapshot,
        options: ResolverOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            store,
            env,
            schemas: RwLock::new(HashMap::new()),
            cache: Mutex::new(ConfigCache::new(options.cache_capacity)),
            listener: Mutex::new(None),
        })
    }

    /// Registers (or replaces) an extension and its configuration schema.
    ///
    /// Cached records of the extension are invalidated.
    pub fn register_extension(&self, extension: &str, schema: Option<Value>) {
        let extension = extension.to_lowercase();
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(extension.clone(), schema);
        self.invalidate(&extension);
    }

    /// Names of registered extensions, sorted.
    pub fn known_extensions(&self) -> Vec<String> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = schemas.keys().cloned().collect();
        names.sort();
        names
    }

    /// Declared schema of an extension.
    pub fn schema(&self, extension: &str) -> Option<Value> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&extension.to_lowercase())
            .cloned()
            .flatten()
    }

    /// Starts following store changes, then bootstraps missing global files
    /// for every registered extension.
    ///
    /// # Returns
    /// Names of the extensions whose file was created.
    pub async fn initialize(self: &Arc<Self>) -> Result<Vec<String>> {
        self.listen_for_changes();

        let mut created = Vec::new();
        for extension in self.known_extensions() {
            if self.ensure_global_file(&extension).await? {
                created.push(extension);
            }
        }

        info!(
            extensions = self.known_extensions().len(),
            created = created.len(),
            "Configuration resolver initialized"
        );
        Ok(created)
    }

    /// Writes the synthesized global file of an extension if none exists.
    ///
    /// An existing file is never touched.
    ///
    /// # Returns
    /// `true` if a file was written.
    pub async fn ensure_global_file(&self, extension: &str) -> Result<bool> {
        let extension = extension.to_lowercase();
        let store_error = |source| ConfigError::Store { extension: extension.clone(), source };

        if self.store.read_global_file(&extension).await.map_err(store_error)?.is_some() {
            return Ok(false);
        }
        let Some(payload) = self.schema(&extension).and_then(|s| default_file_payload(&extension, &s))
        else {
            return Ok(false);
        };

        self.store.write_global_file(&extension, &payload).await.map_err(store_error)?;
        info!(extension = %extension, "Created default global configuration file");
        Ok(true)
    }

    /// Resolves the effective configuration of an extension.
    ///
    /// The record for a given key is computed once and shared until the
    /// extension is invalidated.
    ///
    /// # Errors
    /// Fails when the global file cannot be read or parsed. Problems with the
    /// bot file only produce a warning.
    pub async fn get(
        &self,
        extension: &str,
        bot_id: Option<&str>,
        ignore_global: bool,
    ) -> Result<Arc<ConfigRecord>> {
        let key = ConfigKey::new(extension, bot_id, ignore_global);

        let generation = {
            let mut cache = self.lock_cache();
            if let Some(record) = cache.get(&key) {
                return Ok(record);
            }
            cache.generation(&key.extension)
        };

        let record = Arc::new(self.compute(&key).await?);
        self.lock_cache().insert(key, Arc::clone(&record), generation);
        Ok(record)
    }

    /// Configuration of an extension without any bot override.
    pub async fn global_config(&self, extension: &str) -> Result<Arc<ConfigRecord>> {
        self.get(extension, None, false).await
    }

    /// Configuration of an extension for a bot.
    pub async fn bot_config(&self, extension: &str, bot_id: &str) -> Result<Arc<ConfigRecord>> {
        self.get(extension, Some(bot_id), false).await
    }

    async fn compute(&self, key: &ConfigKey) -> Result<ConfigRecord> {
        let extension = key.extension.as_str();
        let schema = self.schema(extension);
        let mut config = schema.as_ref().map(schema_defaults).unwrap_or_default();

        if !key.ignore_global {
            let text = self.store.read_global_file(extension).await.map_err(|source| {
                ConfigError::Store { extension: extension.to_string(), source }
            })?;
            if let Some(text) = text {
                let parsed: Value = serde_json::from_str(&text).map_err(|source| {
                    ConfigError::Parse { extension: extension.to_string(), source }
                })?;
                let Value::Object(global) = parsed else {
                    return Err(ConfigError::NotAnObject { extension: extension.to_string() });
                };
                merge_top_level(&mut config, global);
            }

            if let Some(schema) = &schema {
                env::apply_overrides(extension, schema, &self.env, &mut config);
            }
        }

        if let Some(bot_id) = key.bot_id.as_deref() {
            if let Some(overrides) = self.read_bot_overrides(extension, bot_id).await {
                merge_top_level(&mut config, overrides);
            }
        }

        config.remove(SCHEMA_REFERENCE_KEY);
        debug!(key = %key, "Configuration computed");
        Ok(config)
    }

    async fn read_bot_overrides(&self, extension: &str, bot_id: &str) -> Option<ConfigRecord> {
        let text = match self.store.read_bot_file(extension, bot_id).await {
            Ok(text) => text?,
            Err(e) => {
                warn!(extension = %extension, bot_id = %bot_id, error = %e, "Could not read bot configuration, ignoring it");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(overrides)) => Some(overrides),
            Ok(_) => {
                warn!(extension = %extension, bot_id = %bot_id, "Bot configuration is not a JSON object, ignoring it");
                None
            }
            Err(e) => {
                warn!(extension = %extension, bot_id = %bot_id, error = %e, "Bot configuration is not valid JSON, ignoring it");
                None
            }
        }
    }

    /// Evicts every cached record of an extension.
    ///
    /// # Returns
    /// The number of evicted records.
    pub fn invalidate(&self, extension: &str) -> usize {
        let evicted = self.lock_cache().invalidate_extension(&extension.to_lowercase());
        if evicted > 0 {
            debug!(extension = %extension, evicted, "Configuration cache invalidated");
        }
        evicted
    }

    /// Drops every cached record.
    pub fn clear_cache(&self) -> usize {
        self.lock_cache().clear()
    }

    /// Reacts to a change notification from the store.
    ///
    /// # Returns
    /// The number of evicted records, or `None` when the path does not name
    /// a configuration file.
    pub fn handle_path_changed(&self, path: &str) -> Option<usize> {
        match extract_extension_name(path) {
            Some(extension) => Some(self.invalidate(&extension)),
            None => {
                debug!(path = %path, "Changed path is not an extension configuration file");
                None
            }
        }
    }

    /// Subscribes to store notifications, unless already subscribed.
    ///
    /// The listening task ends when the store drops its notification channel
    /// or the resolver is dropped.
    ///
    /// # Returns
    /// `true` if a new listener was started.
    pub fn listen_for_changes(self: &Arc<Self>) -> bool {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let resolver = Arc::downgrade(self);
        let changes = self.store.subscribe();
        *listener = Some(tokio::spawn(follow_changes(resolver, changes)));
        debug!("Listening for configuration changes");
        true
    }

    /// Whether store notifications are being followed.
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Environment variables an extension's schema exposes.
    pub fn env_variable_names(&self, extension: &str) -> Vec<EnvVariable> {
        let extension = extension.to_lowercase();
        self.schema(&extension)
            .map(|schema| env::variables_for(&extension, &schema))
            .unwrap_or_default()
    }

    /// Cache statistics snapshot.
    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    fn lock_cache(&self) -> MutexGuard<'_, ConfigCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConfigResolver {
    fn drop(&mut self) {
        if let Some(task) = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

async fn follow_changes(weak: Weak<ConfigResolver>, mut changes: broadcast::Receiver<String>) {
    loop {
        let received = changes.recv().await;
        let Some(resolver) = weak.upgrade() else {
            break;
        };
        match received {
            Ok(path) => {
                resolver.handle_path_changed(&path);
            }
            Err(RecvError::Lagged(skipped)) => {
                let cleared = resolver.clear_cache();
                warn!(skipped, cleared, "Missed configuration change notifications, cache cleared");
            }
            Err(RecvError::Closed) => {
                debug!("Configuration change stream closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_extension_name() {
        assert_eq!(extract_extension_name("global/config/foo.json").as_deref(), Some("foo"));
        assert_eq!(
            extract_extension_name("data/bots/welcome-bot/config/Channel-Web.json").as_deref(),
            Some("channel-web")
        );
        assert_eq!(extract_extension_name("config/foo.json").as_deref(), Some("foo"));
        assert_eq!(extract_extension_name(r"bots\b1\config\nlu.json").as_deref(), Some("nlu"));
        assert_eq!(extract_extension_name("bots/b1/flows/main.flow.json"), None);
        assert_eq!(extract_extension_name("myconfig/foo.json"), None);
        assert_eq!(extract_extension_name("config/foo.json.bak"), None);
        assert_eq!(extract_extension_name(""), None);
    }

    #[test]
    fn test_options_validation() {
        assert!(ResolverOptions::default().validate().is_ok());
        assert!(ResolverOptions { cache_capacity: 0 }.validate().is_err());
    }

    #[test]
    fn test_options_missing_fields_use_defaults() {
        let options: ResolverOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.cache_capacity, 1000);
    }
}
