//! # Cluster Adapter
//!
//! The `Cluster` trait is the only way the installer touches the
//! orchestrator. `DockerCli` shells out to the `docker` binary;
//! `MemoryCluster` records calls for dry runs and tests.

mod docker;
mod memory;

pub use docker::DockerCli;
pub use memory::MemoryCluster;

use crate::error::DeployError;
use async_trait::async_trait;
use serde::Serialize;
use stackforge_core::ResourceKind;
use std::path::Path;

// =============================================================================
// SERVICE REPLICAS
// =============================================================================

/// Running vs desired replica count of one service of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceReplicas {
    pub name: String,
    pub running: u32,
    pub desired: u32,
}

impl ServiceReplicas {
    pub fn new(name: impl Into<String>, running: u32, desired: u32) -> Self {
        Self {
            name: name.into(),
            running,
            desired,
        }
    }

    /// Parse one `<name> <running>/<desired>` line. Trailing text after the
    /// counts (`(max 1 per node)`) is ignored.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let (running, desired) = fields.next()?.split_once('/')?;
        Some(Self::new(name, running.parse().ok()?, desired.parse().ok()?))
    }

    pub fn is_converged(&self) -> bool {
        self.running == self.desired
    }
}

// =============================================================================
// CLUSTER TRAIT
// =============================================================================

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Names of existing objects of `kind`.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, DeployError>;

    async fn create_network(&self, name: &str) -> Result<(), DeployError>;

    async fn create_volume(&self, name: &str) -> Result<(), DeployError>;

    /// Create a named config from the file at `source`.
    async fn create_config(&self, name: &str, source: &Path) -> Result<(), DeployError>;

    /// Deploy (or update) the stack `name` from the manifest at `manifest`.
    async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<(), DeployError>;

    async fn list_stacks(&self) -> Result<Vec<String>, DeployError>;

    async fn stack_services(&self, stack: &str) -> Result<Vec<ServiceReplicas>, DeployError>;

    async fn remove_stack(&self, stack: &str) -> Result<(), DeployError>;

    /// Last `tail` log lines of one service.
    async fn service_logs(&self, service: &str, tail: usize) -> Result<String, DeployError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replica_lines() {
        assert_eq!(
            ServiceReplicas::parse_line("grafana_grafana 1/1"),
            Some(ServiceReplicas::new("grafana_grafana", 1, 1))
        );
        let global = ServiceReplicas::parse_line("monitor_cadvisor 2/3 (max 1 per node)")
            .expect("global service line");
        assert_eq!((global.running, global.desired), (2, 3));
        assert!(!global.is_converged());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(ServiceReplicas::parse_line(""), None);
        assert_eq!(ServiceReplicas::parse_line("name"), None);
        assert_eq!(ServiceReplicas::parse_line("name one/1"), None);
    }
}
