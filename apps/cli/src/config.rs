//! CLI settings loading.

use anyhow::Context;
use parley_core::{RegistryOptions, ResolverOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File looked up in the data root when `--settings` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "parley.toml";

/// Runtime settings read from `parley.toml`.
///
/// ```toml
/// [resolver]
/// cache_capacity = 500
///
/// [registry]
/// hook_timeout_secs = 30
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub resolver: ResolverOptions,
    #[serde(default)]
    pub registry: RegistryOptions,
}

impl Settings {
    /// Load settings.
    ///
    /// Precedence:
    /// 1. Explicit `--settings` file (must exist)
    /// 2. `parley.toml` in the data root
    /// 3. Defaults
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Self> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(DEFAULT_SETTINGS_FILE);
                if !candidate.is_file() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: Self = toml::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.resolver.validate()?;
        self.registry.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load(None, temp_dir.path()).unwrap();
        assert_eq!(settings.resolver, ResolverOptions::default());
        assert_eq!(settings.registry, RegistryOptions::default());
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("parley.toml"), "[resolver]\ncache_capacity = 5\n")
            .unwrap();

        let settings = Settings::load(None, temp_dir.path()).unwrap();
        assert_eq!(settings.resolver.cache_capacity, 5);
        assert_eq!(settings.registry.hook_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(&path, "[resolver]\ncache_capacity = 0\n").unwrap();

        assert!(Settings::load(Some(&path), temp_dir.path()).is_err());
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(Settings::load(Some(&missing), temp_dir.path()).is_err());
    }
}
