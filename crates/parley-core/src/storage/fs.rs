//! Filesystem-backed configuration store.
//!
//! Layout under the data root:
//! ```text
//! global/config/<extension>.json
//! bots/<bot_id>/config/<extension>.json
//! assets/modules/<extension>/config.schema.json
//! ```

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parley_abstraction::{ConfigStore, StoreError};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use super::CHANGE_CHANNEL_CAPACITY;

const SCHEMA_FILE_NAME: &str = "config.schema.json";

/// Configuration store reading JSON files below a data root.
#[derive(Debug)]
pub struct FsConfigStore {
    root: PathBuf,
    changes: broadcast::Sender<String>,
}

impl FsConfigStore {
    /// Creates a store rooted at `root`. Nothing is created on disk.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { root: root.as_ref().to_path_buf(), changes }
    }

    /// Data root of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an extension's global file.
    pub fn global_path(&self, extension: &str) -> Result<PathBuf, StoreError> {
        let extension = checked_segment(extension)?;
        Ok(self.root.join("global").join("config").join(format!("{extension}.json")))
    }

    /// Absolute path of an extension's bot file.
    pub fn bot_path(&self, extension: &str, bot_id: &str) -> Result<PathBuf, StoreError> {
        let extension = checked_segment(extension)?;
        let bot_id = checked_segment(bot_id)?;
        Ok(self
            .root
            .join("bots")
            .join(bot_id)
            .join("config")
            .join(format!("{extension}.json")))
    }

    fn modules_dir(&self) -> PathBuf {
        self.root.join("assets").join("modules")
    }

    /// Writes a bot-scoped file, creating parent directories.
    pub async fn write_bot_file(
        &self,
        extension: &str,
        bot_id: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let path = self.bot_path(extension, bot_id)?;
        write_creating_parents(&path, content).await?;
        self.publish(&path);
        Ok(())
    }

    /// Reads the configuration schema shipped by an extension.
    ///
    /// # Returns
    /// `Ok(None)` when the extension ships no schema.
    pub async fn read_schema(&self, extension: &str) -> Result<Option<Value>, StoreError> {
        let extension = checked_segment(extension)?;
        let path = self.modules_dir().join(extension).join(SCHEMA_FILE_NAME);
        let Some(text) = read_optional(&path).await? else {
            return Ok(None);
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            StoreError::Other(format!("invalid schema {}: {e}", path.display()))
        })
    }

    /// Finds every extension shipping a schema under `assets/modules`.
    ///
    /// # Returns
    /// `(extension, schema)` pairs sorted by extension name.
    pub async fn discover_schemas(&self) -> Result<Vec<(String, Value)>, StoreError> {
        let dir = self.modules_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut schemas = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_lowercase) else {
                continue;
            };
            if let Some(schema) = self.read_schema(&name).await? {
                schemas.push((name, schema));
            }
        }

        schemas.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(root = %self.root.display(), count = schemas.len(), "Discovered extension schemas");
        Ok(schemas)
    }

    /// Starts watching the data root and forwards file events to subscribers.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn watch(&self) -> Result<RecommendedWatcher, StoreError> {
        let handler = event_handler(self.root.clone(), self.changes.clone());
        let mut watcher = notify::recommended_watcher(handler)
            .map_err(|e| StoreError::Watch(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| StoreError::Watch(format!("failed to watch {}: {e}", self.root.display())))?;

        info!(root = %self.root.display(), "Watching configuration files for changes");
        Ok(watcher)
    }

    fn publish(&self, path: &Path) {
        if let Some(relative) = relative_path(&self.root, path) {
            let _ = self.changes.send(relative);
        }
    }
}

#[async_trait]
impl ConfigStore for FsConfigStore {
    async fn read_global_file(&self, extension: &str) -> Result<Option<String>, StoreError> {
        read_optional(&self.global_path(extension)?).await
    }

    async fn read_bot_file(
        &self,
        extension: &str,
        bot_id: &str,
    ) -> Result<Option<String>, StoreError> {
        read_optional(&self.bot_path(extension, bot_id)?).await
    }

    async fn write_global_file(&self, extension: &str, content: &str) -> Result<(), StoreError> {
        let path = self.global_path(extension)?;
        write_creating_parents(&path, content).await?;
        self.publish(&path);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

fn event_handler(
    root: PathBuf,
    changes: broadcast::Sender<String>,
) -> impl Fn(Result<Event, notify::Error>) + Send + Sync + 'static {
    move |result: Result<Event, notify::Error>| match result {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                return;
            }
            for path in &event.paths {
                if let Some(relative) = relative_path(&root, path) {
                    let _ = changes.send(relative);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "File watcher error");
        }
    }
}

/// Root-relative path with `/` separators.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<&str> = relative.iter().filter_map(|s| s.to_str()).collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}

/// Rejects identifiers that would escape their directory.
fn checked_segment(segment: &str) -> Result<&str, StoreError> {
    if segment.is_empty()
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains("..")
    {
        return Err(StoreError::InvalidPath(format!("'{segment}' is not a valid identifier")));
    }
    Ok(segment)
}

async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_creating_parents(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}
