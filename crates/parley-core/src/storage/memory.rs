//! In-memory configuration store.

use async_trait::async_trait;
use parley_abstraction::{ConfigStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

use super::{CHANGE_CHANNEL_CAPACITY, bot_file_path, global_file_path};

/// Configuration store kept entirely in memory.
///
/// Every write publishes the changed path, like a real store would.
#[derive(Debug)]
pub struct MemoryConfigStore {
    global: RwLock<HashMap<String, String>>,
    bots: RwLock<HashMap<(String, String), String>>,
    changes: broadcast::Sender<String>,
    global_writes: AtomicUsize,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            global: RwLock::new(HashMap::new()),
            bots: RwLock::new(HashMap::new()),
            changes,
            global_writes: AtomicUsize::new(0),
        }
    }

    /// Writes a bot-scoped file and publishes the change.
    pub fn write_bot_file(&self, extension: &str, bot_id: &str, content: &str) {
        self.bots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((extension.to_string(), bot_id.to_string()), content.to_string());
        let _ = self.changes.send(bot_file_path(extension, bot_id));
    }

    /// Removes a global file and publishes the change.
    pub fn remove_global_file(&self, extension: &str) -> bool {
        let removed = self
            .global
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(extension)
            .is_some();
        if removed {
            let _ = self.changes.send(global_file_path(extension));
        }
        removed
    }

    /// Number of global writes performed through [`ConfigStore::write_global_file`].
    pub fn global_writes(&self) -> usize {
        self.global_writes.load(Ordering::SeqCst)
    }

    /// Publishes an arbitrary changed path.
    pub fn notify_changed(&self, path: &str) {
        let _ = self.changes.send(path.to_string());
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn read_global_file(&self, extension: &str) -> Result<Option<String>, StoreError> {
        Ok(self.global.read().unwrap_or_else(PoisonError::into_inner).get(extension).cloned())
    }

    async fn read_bot_file(
        &self,
        extension: &str,
        bot_id: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .bots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(extension.to_string(), bot_id.to_string()))
            .cloned())
    }

    async fn write_global_file(&self, extension: &str, content: &str) -> Result<(), StoreError> {
        self.global
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(extension.to_string(), content.to_string());
        self.global_writes.fetch_add(1, Ordering::SeqCst);
        let _ = self.changes.send(global_file_path(extension));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}
