//! In-process readiness gate.

use async_trait::async_trait;
use parley_abstraction::{LifecycleStage, ReadinessGate};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info};

/// Process-wide readiness barrier backed by one watch channel per stage.
pub struct AppLifecycle {
    stages: HashMap<LifecycleStage, watch::Sender<bool>>,
}

impl fmt::Debug for AppLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let done: Vec<&str> = LifecycleStage::ALL
            .iter()
            .filter(|stage| self.is_done(**stage))
            .map(LifecycleStage::as_str)
            .collect();
        f.debug_struct("AppLifecycle").field("done", &done).finish()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AppLifecycle {
    /// Creates a gate with no stage signalled.
    #[must_use]
    pub fn new() -> Self {
        let stages = LifecycleStage::ALL
            .into_iter()
            .map(|stage| (stage, watch::channel(false).0))
            .collect();
        Self { stages }
    }

    fn sender(&self, stage: LifecycleStage) -> &watch::Sender<bool> {
        // Every stage gets a channel in `new`.
        &self.stages[&stage]
    }
}

#[async_trait]
impl ReadinessGate for AppLifecycle {
    async fn wait_for(&self, stage: LifecycleStage) {
        let mut rx = self.sender(stage).subscribe();
        if rx.wait_for(|done| *done).await.is_err() {
            debug!(stage = %stage, "Readiness channel closed while waiting");
        }
    }

    fn set_done(&self, stage: LifecycleStage) {
        let was_done = self.sender(stage).send_replace(true);
        if !was_done {
            info!(stage = %stage, "Lifecycle stage reached");
        }
    }

    fn is_done(&self, stage: LifecycleStage) -> bool {
        *self.sender(stage).borrow()
    }
}
