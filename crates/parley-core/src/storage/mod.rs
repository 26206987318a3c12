//! Configuration store implementations.
//!
//! Both stores publish changed paths relative to their root, using `/` as
//! separator:
//! - `global/config/<extension>.json`
//! - `bots/<bot_id>/config/<extension>.json`

pub mod fs;
pub mod memory;

pub use fs::FsConfigStore;
pub use memory::MemoryConfigStore;

/// Capacity of the change notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Store-relative path of a global configuration file.
#[must_use]
pub fn global_file_path(extension: &str) -> String {
    format!("global/config/{extension}.json")
}

/// Store-relative path of a bot configuration file.
#[must_use]
pub fn bot_file_path(extension: &str, bot_id: &str) -> String {
    format!("bots/{bot_id}/config/{extension}.json")
}
