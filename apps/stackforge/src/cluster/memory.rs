//! In-memory [`Cluster`] used for dry runs and tests.
//!
//! Every call is recorded. Replica answers can be scripted per stack; the
//! last scripted answer repeats. A deployed stack without a script reports
//! one converged service.

use super::{Cluster, ServiceReplicas};
use crate::error::DeployError;
use async_trait::async_trait;
use stackforge_core::ResourceKind;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    existing: BTreeSet<(ResourceKind, String)>,
    created: Vec<(ResourceKind, String)>,
    deployed: Vec<String>,
    manifests: BTreeMap<String, String>,
    stacks: BTreeSet<String>,
    removed: Vec<String>,
    scripts: BTreeMap<String, VecDeque<Vec<ServiceReplicas>>>,
    fail_create: BTreeSet<String>,
    fail_deploy: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pretend `name` already exists on the cluster.
    pub fn seed(&self, kind: ResourceKind, name: &str) {
        self.state().existing.insert((kind, name.to_string()));
    }

    /// Make creating the object `name` fail.
    pub fn fail_create(&self, name: &str) {
        self.state().fail_create.insert(name.to_string());
    }

    /// Make deploying the stack `name` fail.
    pub fn fail_deploy(&self, name: &str) {
        self.state().fail_deploy.insert(name.to_string());
    }

    /// Queue replica answers for `stack`.
    pub fn script(&self, stack: &str, answers: Vec<Vec<ServiceReplicas>>) {
        self.state()
            .scripts
            .insert(stack.to_string(), answers.into_iter().collect());
    }

    /// Objects created through this adapter, in call order.
    pub fn created(&self) -> Vec<(ResourceKind, String)> {
        self.state().created.clone()
    }

    /// Stacks deployed through this adapter, in call order.
    pub fn deployed(&self) -> Vec<String> {
        self.state().deployed.clone()
    }

    /// Manifest text read at deploy time.
    pub fn manifest(&self, stack: &str) -> Option<String> {
        self.state().manifests.get(stack).cloned()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }

    fn create(&self, kind: ResourceKind, name: &str) -> Result<(), DeployError> {
        let mut state = self.state();
        if state.fail_create.contains(name) {
            return Err(DeployError::ResourceProvision {
                kind,
                name: name.to_string(),
                detail: "injected failure".to_string(),
            });
        }
        state.existing.insert((kind, name.to_string()));
        state.created.push((kind, name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl Cluster for MemoryCluster {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<String>, DeployError> {
        Ok(self
            .state()
            .existing
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn create_network(&self, name: &str) -> Result<(), DeployError> {
        self.create(ResourceKind::Network, name)
    }

    async fn create_volume(&self, name: &str) -> Result<(), DeployError> {
        self.create(ResourceKind::Volume, name)
    }

    async fn create_config(&self, name: &str, _source: &Path) -> Result<(), DeployError> {
        self.create(ResourceKind::Config, name)
    }

    async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<(), DeployError> {
        let failing = self.state().fail_deploy.contains(name);
        if failing {
            return Err(DeployError::Command {
                command: format!("stack deploy {name}"),
                detail: "injected failure".to_string(),
            });
        }
        let text = tokio::fs::read_to_string(manifest)
            .await
            .map_err(|e| DeployError::store(manifest, e))?;
        let mut state = self.state();
        state.manifests.insert(name.to_string(), text);
        state.stacks.insert(name.to_string());
        state.deployed.push(name.to_string());
        Ok(())
    }

    async fn list_stacks(&self) -> Result<Vec<String>, DeployError> {
        Ok(self.state().stacks.iter().cloned().collect())
    }

    async fn stack_services(&self, stack: &str) -> Result<Vec<ServiceReplicas>, DeployError> {
        let mut state = self.state();
        if let Some(queue) = state.scripts.get_mut(stack) {
            let answer = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            return Ok(answer.unwrap_or_default());
        }
        if state.stacks.contains(stack) {
            return Ok(vec![ServiceReplicas::new(format!("{stack}_{stack}"), 1, 1)]);
        }
        Ok(Vec::new())
    }

    async fn remove_stack(&self, stack: &str) -> Result<(), DeployError> {
        let mut state = self.state();
        state.stacks.remove(stack);
        state.removed.push(stack.to_string());
        Ok(())
    }

    async fn service_logs(&self, service: &str, tail: usize) -> Result<String, DeployError> {
        Ok(format!("{service}: last {tail} lines\n"))
    }
}
