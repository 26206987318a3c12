// Error types for the extension registry

use crate::config::ConfigError;
use crate::extensions::hooks::{HookError, HookPhase};
use crate::extensions::loader::LoaderError;
use crate::extensions::validator::ValidationError;
use parley_abstraction::ResourceError;
use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The descriptor is invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration could not be resolved or bootstrapped
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A hook failed
    #[error("error in extension '{extension}' {phase}: {source}")]
    Hook {
        /// Extension owning the hook
        extension: String,
        /// Lifecycle point
        phase: HookPhase,
        /// Hook error
        #[source]
        source: HookError,
    },

    /// `onBotMount` failed, which aborts the mount
    #[error("while mounting bot '{bot_id}' in extension '{extension}': {source}{}", upstream_details(.source))]
    Mount {
        /// Extension owning the hook
        extension: String,
        /// Bot being mounted
        bot_id: String,
        /// Hook error
        #[source]
        source: HookError,
    },

    /// The resource manager failed
    #[error("resources of extension '{extension}' failed: {source}")]
    Resources {
        /// Extension whose resources were handled
        extension: String,
        /// Resource error
        #[source]
        source: ResourceError,
    },

    /// The loader failed
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// `load_extensions` was already called
    #[error("extensions have already been loaded")]
    AlreadyInitialized,

    /// Reload requested before `load_extensions`
    #[error("configuration reader is not initialized (load extensions first)")]
    NotInitialized,

    /// An extension with this name is active
    #[error("extension '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// No extension with this name is loaded
    #[error("extension '{0}' not registered")]
    NotRegistered(String),

    /// Registry options are invalid
    #[error("invalid registry options: {0}")]
    InvalidOptions(String),
}

fn upstream_details(source: &HookError) -> String {
    match source.upstream() {
        Some(upstream) => match upstream.status {
            Some(status) => format!(" (for url {}, status {status})", upstream.url),
            None => format!(" (for url {})", upstream.url),
        },
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_error_carries_upstream_details() {
        let err = RegistryError::Mount {
            extension: "nlu".to_string(),
            bot_id: "welcome-bot".to_string(),
            source: HookError::new("training failed").with_upstream(Some(503), "http://lang/train"),
        };
        assert_eq!(
            err.to_string(),
            "while mounting bot 'welcome-bot' in extension 'nlu': training failed (for url http://lang/train, status 503)"
        );

        let err = RegistryError::Mount {
            extension: "nlu".to_string(),
            bot_id: "b".to_string(),
            source: HookError::new("boom"),
        };
        assert_eq!(err.to_string(), "while mounting bot 'b' in extension 'nlu': boom");
    }

    #[test]
    fn test_hook_error_names_phase() {
        let err = RegistryError::Hook {
            extension: "qna".to_string(),
            phase: HookPhase::ServerStarted,
            source: HookError::new("no database"),
        };
        assert_eq!(err.to_string(), "error in extension 'qna' onServerStarted: no database");
    }
}
