//! Remote backend: authenticate, resolve the endpoint, submit the stack.

use super::DeployBackend;
use crate::error::DeployError;
use crate::management::ManagementClient;
use crate::settings::StackType;
use crate::store::ManagementCredentials;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct ApiBackend {
    client: ManagementClient,
    credentials: ManagementCredentials,
    stack_type: StackType,
    /// Bearer token reused across deployments of one run.
    token: Mutex<Option<String>>,
}

impl ApiBackend {
    pub fn new(
        client: ManagementClient,
        credentials: ManagementCredentials,
        stack_type: StackType,
    ) -> Self {
        Self {
            client,
            credentials,
            stack_type,
            token: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, DeployError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.client.authenticate(&self.credentials).await?;
        debug!("Authenticated against management API");
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn submit(&self, stack: &str, manifest: &str) -> Result<(), DeployError> {
        let token = self.token().await?;
        let endpoint_id = self.client.endpoint_id(&token).await?;
        let swarm_id = match self.stack_type {
            StackType::Swarm => Some(self.client.swarm_id(&token).await?),
            StackType::Standalone => None,
        };
        self.client
            .create_stack(
                &token,
                self.stack_type,
                endpoint_id,
                swarm_id.as_deref(),
                stack,
                manifest,
            )
            .await
    }
}

#[async_trait]
impl DeployBackend for ApiBackend {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn deploy(&self, stack: &str, manifest: &str) -> Result<&'static str, DeployError> {
        match self.submit(stack, manifest).await {
            Ok(()) => {
                info!(stack, "Deployed through management API");
                Ok(self.name())
            }
            Err(e) => {
                if matches!(e, DeployError::BackendAuth(_)) {
                    *self.token.lock().await = None;
                }
                Err(e)
            }
        }
    }
}
