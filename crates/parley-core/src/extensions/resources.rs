//! Resource manager for hosts without extension assets.

use async_trait::async_trait;
use parley_abstraction::{ResourceError, ResourceManager};
use tracing::debug;

/// Resource manager that only logs what it is asked to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResourceManager;

#[async_trait]
impl ResourceManager for NoopResourceManager {
    async fn enable_resources(&self, extension: &str) -> Result<(), ResourceError> {
        debug!(extension = %extension, "Enable resources (no-op)");
        Ok(())
    }

    async fn disable_resources(&self, extension: &str) -> Result<(), ResourceError> {
        debug!(extension = %extension, "Disable resources (no-op)");
        Ok(())
    }

    async fn run_migrations(&self, extension: &str) -> Result<(), ResourceError> {
        debug!(extension = %extension, "Run migrations (no-op)");
        Ok(())
    }

    async fn import_resources(&self, extension: &str) -> Result<(), ResourceError> {
        debug!(extension = %extension, "Import resources (no-op)");
        Ok(())
    }
}
