//! Extension lifecycle state tracking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Lifecycle state of one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionState {
    /// Not loaded.
    Unloaded,
    /// Being validated, started and registered.
    Loading,
    /// Registered and resources prepared.
    Loaded,
    /// Validation, start hook or resource setup failed.
    LoadFailed,
    /// Loaded, waiting for the HTTP server to become ready.
    ReadyPending,
    /// Ready hook attempted.
    Ready,
    /// Being unloaded.
    Unloading,
}

impl ExtensionState {
    /// Checks if the extension can move to the given state.
    ///
    /// # Arguments
    /// * `to` - The target state
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Unloaded | Self::LoadFailed, Self::Loading) => true,
            (Self::Loading, Self::Loaded | Self::LoadFailed) => true,
            (Self::Loaded, Self::ReadyPending | Self::Unloading) => true,
            (Self::ReadyPending, Self::Ready | Self::Unloading) => true,
            (Self::Ready, Self::Unloading) => true,
            // A failed unload restores the previous state
            (Self::Unloading, Self::Unloaded | Self::Loaded | Self::ReadyPending | Self::Ready) => {
                true
            }
            // A reload whose ready hook failed is rolled back
            (Self::Unloading, Self::LoadFailed) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Get the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::LoadFailed => "load_failed",
            Self::ReadyPending => "ready_pending",
            Self::Ready => "ready",
            Self::Unloading => "unloading",
        }
    }
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of every extension the registry has seen.
#[derive(Default)]
pub struct ExtensionLifecycle {
    states: RwLock<HashMap<String, ExtensionState>>,
}

impl fmt::Debug for ExtensionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionLifecycle")
            .field("tracked", &self.states.try_read().map(|s| s.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl ExtensionLifecycle {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, `Unloaded` for unknown extensions.
    pub async fn get_state(&self, name: &str) -> ExtensionState {
        self.states.read().await.get(name).copied().unwrap_or(ExtensionState::Unloaded)
    }

    /// Moves an extension to `new_state`.
    ///
    /// # Returns
    /// `Ok` with the previous state, or `Err` with the current state if the
    /// transition is invalid.
    pub async fn set_state(
        &self,
        name: &str,
        new_state: ExtensionState,
    ) -> Result<ExtensionState, ExtensionState> {
        let mut states = self.states.write().await;
        let current = states.get(name).copied().unwrap_or(ExtensionState::Unloaded);

        if !current.can_transition_to(new_state) {
            error!(
                extension = %name,
                from = %current,
                to = %new_state,
                "Invalid extension state transition"
            );
            return Err(current);
        }

        debug!(extension = %name, from = %current, to = %new_state, "Extension state transition");
        states.insert(name.to_string(), new_state);
        Ok(current)
    }

    /// All tracked extensions and their states, sorted by name.
    pub async fn snapshot(&self) -> Vec<(String, ExtensionState)> {
        let states = self.states.read().await;
        let mut snapshot: Vec<_> = states.iter().map(|(name, state)| (name.clone(), *state)).collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use ExtensionState::*;
        assert!(Unloaded.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Loaded));
        assert!(Loading.can_transition_to(LoadFailed));
        assert!(Loaded.can_transition_to(ReadyPending));
        assert!(ReadyPending.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Unloading));
        assert!(Unloading.can_transition_to(Unloaded));
        assert!(LoadFailed.can_transition_to(Loading));
        assert!(Unloading.can_transition_to(LoadFailed));
    }

    #[test]
    fn test_invalid_transitions() {
        use ExtensionState::*;
        assert!(!Unloaded.can_transition_to(Ready));
        assert!(!Loading.can_transition_to(Ready));
        assert!(!LoadFailed.can_transition_to(Unloading));
        assert!(!Ready.can_transition_to(Loading));
        assert!(!Unloaded.can_transition_to(Unloading));
    }

    #[tokio::test]
    async fn test_set_state() {
        let lifecycle = ExtensionLifecycle::new();
        assert_eq!(lifecycle.get_state("nlu").await, ExtensionState::Unloaded);

        assert_eq!(
            lifecycle.set_state("nlu", ExtensionState::Loading).await,
            Ok(ExtensionState::Unloaded)
        );
        assert_eq!(
            lifecycle.set_state("nlu", ExtensionState::Ready).await,
            Err(ExtensionState::Loading)
        );
        assert_eq!(lifecycle.get_state("nlu").await, ExtensionState::Loading);
    }

    #[tokio::test]
    async fn test_snapshot_sorted() {
        let lifecycle = ExtensionLifecycle::new();
        lifecycle.set_state("b", ExtensionState::Loading).await.unwrap();
        lifecycle.set_state("a", ExtensionState::Loading).await.unwrap();

        let names: Vec<String> = lifecycle.snapshot().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
