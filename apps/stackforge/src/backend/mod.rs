//! # Deployment Backends
//!
//! One contract, three implementations:
//! - `CliBackend`: write the manifest to its stable path, then deploy it
//!   through the cluster CLI
//! - `ApiBackend`: submit the manifest to the management API
//! - `FallbackBackend`: API first, CLI exactly once if the API fails

mod api;
mod cli;

pub use api::ApiBackend;
pub use cli::CliBackend;

use crate::error::DeployError;
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait DeployBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deploy `manifest` as stack `stack`. Returns the name of the backend
    /// that actually performed the deployment.
    async fn deploy(&self, stack: &str, manifest: &str) -> Result<&'static str, DeployError>;
}

// =============================================================================
// FALLBACK
// =============================================================================

/// Any error from `primary` retries the same deployment through `fallback`
/// once. Both failing yields `FallbackFailed` carrying both details.
pub struct FallbackBackend {
    primary: Box<dyn DeployBackend>,
    fallback: Box<dyn DeployBackend>,
}

impl FallbackBackend {
    pub fn new(primary: Box<dyn DeployBackend>, fallback: Box<dyn DeployBackend>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl DeployBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn deploy(&self, stack: &str, manifest: &str) -> Result<&'static str, DeployError> {
        let primary_err = match self.primary.deploy(stack, manifest).await {
            Ok(used) => return Ok(used),
            Err(e) => e,
        };
        warn!(
            stack,
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Primary backend failed, retrying through fallback"
        );
        self.fallback
            .deploy(stack, manifest)
            .await
            .map_err(|fallback_err| DeployError::FallbackFailed {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            })
    }
}
