//! # Resource Provisioner
//!
//! Idempotent "ensure exists" for the shared networks, volumes and named
//! configs a stack references as external.
//!
//! Each call lists the existing objects of its kind and creates the object
//! only when absent. List-then-create is not atomic against another
//! process provisioning the same cluster; inside one process every ensure
//! call goes through a single lock so concurrent deployments never race
//! each other.

use crate::cluster::Cluster;
use crate::error::DeployError;
use serde::Serialize;
use stackforge_core::{ResourceKind, StackDescriptor};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What an ensure call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::AlreadyExists => "already exists",
        })
    }
}

/// One line of a per-stack provisioning report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: ProvisionOutcome,
}

pub struct Provisioner {
    cluster: Arc<dyn Cluster>,
    serial: Mutex<()>,
}

impl Provisioner {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self {
            cluster,
            serial: Mutex::new(()),
        }
    }

    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool, DeployError> {
        let existing = self
            .cluster
            .list(kind)
            .await
            .map_err(|e| DeployError::ResourceProvision {
                kind,
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        Ok(existing.iter().any(|n| n == name))
    }

    async fn ensure(
        &self,
        kind: ResourceKind,
        name: &str,
        source: Option<&Path>,
    ) -> Result<ProvisionOutcome, DeployError> {
        let _guard = self.serial.lock().await;

        if self.exists(kind, name).await? {
            debug!(%kind, name, "Resource already exists");
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        match (kind, source) {
            (ResourceKind::Network, _) => self.cluster.create_network(name).await?,
            (ResourceKind::Volume, _) => self.cluster.create_volume(name).await?,
            (ResourceKind::Config, Some(path)) => self.cluster.create_config(name, path).await?,
            (ResourceKind::Config, None) => {
                return Err(DeployError::ResourceProvision {
                    kind,
                    name: name.to_string(),
                    detail: "no source file rendered for this config".to_string(),
                });
            }
        }
        info!(%kind, name, "Created resource");
        Ok(ProvisionOutcome::Created)
    }

    pub async fn ensure_network(&self, name: &str) -> Result<ProvisionOutcome, DeployError> {
        self.ensure(ResourceKind::Network, name, None).await
    }

    pub async fn ensure_volume(&self, name: &str) -> Result<ProvisionOutcome, DeployError> {
        self.ensure(ResourceKind::Volume, name, None).await
    }

    /// Named configs are immutable on the cluster: an existing config is
    /// left alone even if `source` changed.
    pub async fn ensure_config(
        &self,
        name: &str,
        source: &Path,
    ) -> Result<ProvisionOutcome, DeployError> {
        self.ensure(ResourceKind::Config, name, Some(source)).await
    }

    /// Ensure every resource `descriptor` declares. `config_sources` maps a
    /// config name to its rendered file. Stops at the first failure.
    pub async fn ensure_for_stack(
        &self,
        descriptor: &StackDescriptor,
        config_sources: &BTreeMap<String, PathBuf>,
    ) -> Result<Vec<Provisioned>, DeployError> {
        let mut report = Vec::new();
        for (kind, name) in descriptor.required_resources() {
            let source = config_sources.get(name).map(PathBuf::as_path);
            let outcome = self.ensure(kind, name, source).await?;
            report.push(Provisioned {
                kind,
                name: name.to_string(),
                outcome,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;
    use stackforge_core::Catalog;

    #[tokio::test]
    async fn ensure_network_creates_once() {
        let cluster = Arc::new(MemoryCluster::new());
        let provisioner = Provisioner::new(cluster.clone());

        let first = provisioner.ensure_network("externa").await.expect("first");
        let second = provisioner.ensure_network("externa").await.expect("second");

        assert_eq!(first, ProvisionOutcome::Created);
        assert_eq!(second, ProvisionOutcome::AlreadyExists);
        assert_eq!(cluster.created().len(), 1);
    }

    #[tokio::test]
    async fn config_without_source_fails() {
        let provisioner = Provisioner::new(Arc::new(MemoryCluster::new()));
        let catalog = Catalog::builtin();
        let dozzle = catalog.require("dozzle").expect("dozzle");

        let err = provisioner
            .ensure_for_stack(dozzle, &BTreeMap::new())
            .await
            .expect_err("config source missing");
        assert!(err.to_string().contains("config_dozzle"));
    }

    #[tokio::test]
    async fn create_failure_is_surfaced() {
        let cluster = Arc::new(MemoryCluster::new());
        cluster.fail_create("grafana_data");
        let provisioner = Provisioner::new(cluster);
        let err = provisioner.ensure_volume("grafana_data").await.expect_err("fails");
        assert!(matches!(err, DeployError::ResourceProvision { .. }));
    }

    #[tokio::test]
    async fn stack_report_lists_every_resource() {
        let cluster = Arc::new(MemoryCluster::new());
        cluster.seed(ResourceKind::Network, "externa");
        let provisioner = Provisioner::new(cluster.clone());
        let catalog = Catalog::builtin();
        let grafana = catalog.require("grafana").expect("grafana");

        let report = provisioner
            .ensure_for_stack(grafana, &BTreeMap::new())
            .await
            .expect("provision");
        assert_eq!(report.len(), grafana.required_resources().count());
        assert!(
            report
                .iter()
                .any(|p| p.name == "externa" && p.outcome == ProvisionOutcome::AlreadyExists)
        );
    }
}
