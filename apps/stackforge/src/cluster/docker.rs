//! `docker` CLI implementation of [`Cluster`].

use super::{Cluster, ServiceReplicas};
use crate::error::DeployError;
use async_trait::async_trait;
use stackforge_core::ResourceKind;
use stackforge_core::primitives::NETWORK_DRIVER;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs every operation as one `docker` invocation with a hard timeout.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("docker", timeout)
    }

    /// Use another binary (a wrapper script, `podman`).
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run `program args...`, returning stdout on a zero exit status.
    async fn run(&self, args: &[&str]) -> Result<String, DeployError> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        debug!(command = %rendered, "Running cluster command");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::Command {
                command: rendered.clone(),
                detail: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DeployError::Command {
                command: rendered.clone(),
                detail: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| DeployError::Command {
                command: rendered.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(DeployError::Command {
                command: rendered,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn provision_error(kind: ResourceKind, name: &str, err: DeployError) -> DeployError {
        DeployError::ResourceProvision {
            kind,
            name: name.to_string(),
            detail: err.to_string(),
        }
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Cluster for DockerCli {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, DeployError> {
        let output = self.run(&[kind.name(), "ls", "--format", "{{.Name}}"]).await?;
        Ok(lines(&output))
    }

    async fn create_network(&self, name: &str) -> Result<(), DeployError> {
        self.run(&[
            "network",
            "create",
            "--driver",
            NETWORK_DRIVER,
            "--attachable",
            name,
        ])
        .await
        .map(drop)
        .map_err(|e| Self::provision_error(ResourceKind::Network, name, e))
    }

    async fn create_volume(&self, name: &str) -> Result<(), DeployError> {
        self.run(&["volume", "create", name])
            .await
            .map(drop)
            .map_err(|e| Self::provision_error(ResourceKind::Volume, name, e))
    }

    async fn create_config(&self, name: &str, source: &Path) -> Result<(), DeployError> {
        let source = source.to_string_lossy();
        self.run(&["config", "create", name, &source])
            .await
            .map(drop)
            .map_err(|e| Self::provision_error(ResourceKind::Config, name, e))
    }

    async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<(), DeployError> {
        let manifest = manifest.to_string_lossy();
        self.run(&["stack", "deploy", "--prune", "-c", &manifest, name])
            .await
            .map(drop)
    }

    async fn list_stacks(&self) -> Result<Vec<String>, DeployError> {
        let output = self.run(&["stack", "ls", "--format", "{{.Name}}"]).await?;
        Ok(lines(&output))
    }

    async fn stack_services(&self, stack: &str) -> Result<Vec<ServiceReplicas>, DeployError> {
        let output = self
            .run(&[
                "stack",
                "services",
                stack,
                "--format",
                "{{.Name}} {{.Replicas}}",
            ])
            .await?;
        Ok(output.lines().filter_map(ServiceReplicas::parse_line).collect())
    }

    async fn remove_stack(&self, stack: &str) -> Result<(), DeployError> {
        self.run(&["stack", "rm", stack]).await.map(drop)
    }

    async fn service_logs(&self, service: &str, tail: usize) -> Result<String, DeployError> {
        let tail = tail.to_string();
        self.run(&["service", "logs", "--no-task-ids", "--tail", &tail, service])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_skips_blanks() {
        assert_eq!(lines("a\n\n b \n"), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn missing_binary_is_a_command_error() {
        let cli = DockerCli::with_program("stackforge-no-such-binary", Duration::from_secs(5));
        let err = cli.list_stacks().await.expect_err("binary does not exist");
        assert!(matches!(err, DeployError::Command { .. }));
    }

    #[tokio::test]
    async fn create_failure_names_the_resource() {
        let cli = DockerCli::with_program("stackforge-no-such-binary", Duration::from_secs(5));
        let err = cli.create_volume("grafana_data").await.expect_err("fails");
        assert!(err.to_string().contains("volume 'grafana_data'"));
    }
}
