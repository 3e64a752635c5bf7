//! Direct backend: stable manifest file plus `stack deploy`.

use super::DeployBackend;
use crate::cluster::Cluster;
use crate::error::DeployError;
use crate::store::write_private;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct CliBackend {
    cluster: Arc<dyn Cluster>,
    manifests_dir: PathBuf,
}

impl CliBackend {
    pub fn new(cluster: Arc<dyn Cluster>, manifests_dir: impl Into<PathBuf>) -> Self {
        Self {
            cluster,
            manifests_dir: manifests_dir.into(),
        }
    }

    /// `<manifests_dir>/<stack>.yaml`, rewritten on every deploy.
    pub fn manifest_path(&self, stack: &str) -> PathBuf {
        self.manifests_dir.join(format!("{stack}.yaml"))
    }

    fn write_manifest(path: &Path, manifest: &str) -> Result<(), DeployError> {
        write_private(path, manifest.as_bytes()).map_err(|e| DeployError::ManifestWrite {
            path: path.display().to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl DeployBackend for CliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn deploy(&self, stack: &str, manifest: &str) -> Result<&'static str, DeployError> {
        let path = self.manifest_path(stack);
        Self::write_manifest(&path, manifest)?;
        self.cluster.deploy_stack(stack, &path).await?;
        info!(stack, path = %path.display(), "Deployed through cluster CLI");
        Ok(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;

    #[tokio::test]
    async fn writes_then_deploys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cluster = Arc::new(MemoryCluster::new());
        let backend = CliBackend::new(cluster.clone(), dir.path().join("manifests"));

        let used = backend.deploy("grafana", "version: '3.8'\n").await.expect("deploy");

        assert_eq!(used, "cli");
        assert_eq!(cluster.deployed(), vec!["grafana".to_string()]);
        assert_eq!(cluster.manifest("grafana").as_deref(), Some("version: '3.8'\n"));
        assert!(backend.manifest_path("grafana").exists());
    }

    #[tokio::test]
    async fn unwritable_path_is_a_manifest_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").expect("write");
        let backend = CliBackend::new(Arc::new(MemoryCluster::new()), blocker.join("manifests"));

        let err = backend.deploy("grafana", "").await.expect_err("parent is a file");
        assert!(matches!(err, DeployError::ManifestWrite { .. }));
    }
}
