//! # Installation Orchestrator
//!
//! Drives one run: plan, bootstrap the management API, then per stack
//! secrets -> manifest -> config sources -> provisioning -> deploy ->
//! readiness.
//!
//! ## Error boundary
//!
//! Planning errors (unknown ids, cycles, missing base domain) abort the run
//! before any side effect. Everything after that is caught per stack and
//! recorded in its `DeploymentResult`; the run moves on to the next stack.
//!
//! ## Modes
//!
//! - Sequential (default): one stack at a time in resolved order.
//! - Parallel: preparation stays serialized in resolved order, then one
//!   task per stack deploys as soon as every dependency's deploy call has
//!   returned.

use crate::backend::{ApiBackend, CliBackend, DeployBackend, FallbackBackend};
use crate::cluster::Cluster;
use crate::error::DeployError;
use crate::management::ManagementClient;
use crate::provision::Provisioner;
use crate::readiness::ReadinessChecker;
use crate::settings::{BackendMode, Settings, StateDir};
use crate::store::{
    CredentialStore, ManagementCredentials, SecretStore, generate_secret, write_private,
};
use serde::Serialize;
use stackforge_core::primitives::{
    ADMIN_PASSWORD_LENGTH, MANAGEMENT_STACK, MANAGEMENT_STATUS_ATTEMPTS,
    MANAGEMENT_STATUS_DELAY_MS, PROXY_STACK,
};
use stackforge_core::{
    ACME_EMAIL_KEY, BASE_DOMAIN_KEY, Catalog, ConfigSource, DeploymentResult, DeploymentStatus,
    PrefixMap, StackforgeError, generate, install_order, template_for,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// =============================================================================
// OPTIONS AND SUMMARY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub parallel: bool,
    /// Poll readiness after each deploy.
    pub wait: bool,
    pub timeout: Duration,
    /// Prefix overrides from the command line, applied after the settings
    /// file.
    pub prefixes: BTreeMap<String, String>,
}

impl InstallOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parallel: false,
            wait: true,
            timeout: settings.readiness_timeout(),
            prefixes: BTreeMap::new(),
        }
    }
}

/// Outcome of a whole run, one result per planned stack in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub order: Vec<String>,
    pub results: Vec<DeploymentResult>,
}

impl RunSummary {
    pub fn result(&self, id: &str) -> Option<&DeploymentResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn count(&self, status: DeploymentStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeploymentResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// A stack whose manifest is rendered and whose resources exist.
#[derive(Debug)]
struct Prepared {
    id: &'static str,
    manifest: String,
    fingerprint: Option<String>,
}

fn failed(id: &str, err: DeployError) -> DeploymentResult {
    error!(stack = id, error = %err, "Stack failed");
    DeploymentResult::failed(id, err.to_string())
}

// =============================================================================
// INSTALLER
// =============================================================================

pub struct Installer {
    catalog: Catalog,
    cluster: Arc<dyn Cluster>,
    secrets: SecretStore,
    state: StateDir,
    settings: Settings,
    options: InstallOptions,
    credentials: CredentialStore,
    management: Option<ManagementClient>,
    cancel: CancellationToken,
    provisioner: Provisioner,
    readiness: Arc<ReadinessChecker>,
}

impl Installer {
    pub fn new(
        catalog: Catalog,
        cluster: Arc<dyn Cluster>,
        secrets: SecretStore,
        state: StateDir,
        settings: Settings,
    ) -> Self {
        Self {
            options: InstallOptions::from_settings(&settings),
            credentials: CredentialStore::new(state.credentials_path()),
            provisioner: Provisioner::new(Arc::clone(&cluster)),
            readiness: Arc::new(ReadinessChecker::new(
                Arc::clone(&cluster),
                settings.poll_interval(),
            )),
            management: None,
            cancel: CancellationToken::new(),
            catalog,
            cluster,
            secrets,
            state,
            settings,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable the management API backend.
    #[must_use]
    pub fn with_management(mut self, client: ManagementClient) -> Self {
        self.management = Some(client);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Validated, dependency-first install order.
    pub fn plan(&self, requested: &[String]) -> Result<Vec<&'static str>, DeployError> {
        self.catalog.validate()?;
        Ok(install_order(&self.catalog, requested)?)
    }

    /// Run a whole installation.
    pub async fn run(&mut self, requested: &[String]) -> Result<RunSummary, DeployError> {
        let order = self.plan(requested)?;
        let base_domain = self.check_settings(&order)?;
        let prefixes = PrefixMap::from_catalog(&self.catalog)
            .with_overrides(self.settings.prefixes.iter())
            .with_overrides(self.options.prefixes.iter());

        info!(stacks = ?order, parallel = self.options.parallel, "Starting installation");

        let mut slots: Vec<Option<DeploymentResult>> = vec![None; order.len()];
        let mut remaining: Vec<(usize, &'static str)> = order.iter().copied().enumerate().collect();

        let api_enabled = self.settings.backend == BackendMode::Auto && self.management.is_some();
        let mut credentials = if api_enabled {
            self.credentials.load()?
        } else {
            None
        };

        if api_enabled {
            if let Some(pos) = order.iter().position(|id| *id == MANAGEMENT_STACK) {
                let fresh = credentials.is_none();
                let creds = match credentials.take() {
                    Some(existing) => existing,
                    None => self.new_credentials()?,
                };
                let cli = self.cli_backend();
                let result = self
                    .install_one(MANAGEMENT_STACK, &base_domain, &prefixes, &cli)
                    .await;
                let deployed = result.status == DeploymentStatus::Deployed;
                slots[pos] = Some(result);
                remaining.retain(|(_, id)| *id != MANAGEMENT_STACK);
                if deployed {
                    self.bring_up_management(&creds, fresh).await;
                }
                credentials = Some(creds);
            }
        }

        let backend = self.select_backend(api_enabled, credentials);

        if self.options.parallel {
            self.run_parallel(&remaining, &base_domain, &prefixes, backend, &mut slots)
                .await;
        } else {
            for (pos, id) in remaining {
                slots[pos] = Some(
                    self.install_one(id, &base_domain, &prefixes, backend.as_ref())
                        .await,
                );
            }
        }

        let results: Vec<DeploymentResult> = slots
            .into_iter()
            .zip(&order)
            .map(|(slot, id)| slot.unwrap_or_else(|| DeploymentResult::cancelled(*id)))
            .collect();
        let summary = RunSummary {
            order: order.iter().map(|id| (*id).to_string()).collect(),
            results,
        };
        info!(
            deployed = summary.count(DeploymentStatus::Deployed),
            failed = summary.count(DeploymentStatus::Failed),
            skipped = summary.count(DeploymentStatus::SkippedUnimplemented),
            cancelled = summary.count(DeploymentStatus::Cancelled),
            "Installation finished"
        );
        Ok(summary)
    }

    /// Base domain, plus the contact email when the proxy is planned.
    fn check_settings(&self, order: &[&'static str]) -> Result<String, DeployError> {
        let config = self.secrets.config();
        let base_domain = config
            .get(BASE_DOMAIN_KEY)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| StackforgeError::MissingSetting(BASE_DOMAIN_KEY.to_string()))?;
        if order.contains(&PROXY_STACK) && !config.contains(ACME_EMAIL_KEY) {
            return Err(StackforgeError::MissingSetting(ACME_EMAIL_KEY.to_string()).into());
        }
        Ok(base_domain.to_string())
    }

    fn cli_backend(&self) -> CliBackend {
        CliBackend::new(Arc::clone(&self.cluster), self.state.manifests_dir())
    }

    fn select_backend(
        &self,
        api_enabled: bool,
        credentials: Option<ManagementCredentials>,
    ) -> Arc<dyn DeployBackend> {
        match (credentials, &self.management) {
            (Some(creds), Some(client)) if api_enabled => {
                let api = ApiBackend::new(client.clone(), creds, self.settings.stack_type);
                Arc::new(FallbackBackend::new(
                    Box::new(api),
                    Box::new(self.cli_backend()),
                ))
            }
            _ => {
                if api_enabled {
                    warn!(
                        "No management credentials stored, deploying through the cluster CLI only"
                    );
                }
                Arc::new(self.cli_backend())
            }
        }
    }

    // =========================================================================
    // MANAGEMENT BOOTSTRAP
    // =========================================================================

    /// Generated before the management stack is deployed and persisted
    /// immediately, so a later failure never loses them.
    fn new_credentials(&self) -> Result<ManagementCredentials, DeployError> {
        let credentials = ManagementCredentials {
            username: self.settings.username.clone(),
            password: generate_secret(ADMIN_PASSWORD_LENGTH),
        };
        self.credentials.save(&credentials)?;
        info!(username = %credentials.username, "Stored new management credentials");
        Ok(credentials)
    }

    /// Wait for the API and create the admin account on a fresh install.
    /// Failures are warnings: the fallback backend covers an API that never
    /// came up.
    async fn bring_up_management(&self, credentials: &ManagementCredentials, fresh: bool) {
        let Some(client) = self.management.as_ref() else {
            return;
        };
        let up = tokio::select! {
            r = client.wait_until_up(
                MANAGEMENT_STATUS_ATTEMPTS,
                Duration::from_millis(MANAGEMENT_STATUS_DELAY_MS),
            ) => r,
            () = self.cancel.cancelled() => Err(DeployError::Cancelled),
        };
        if let Err(e) = up {
            warn!(error = %e, "Management API did not come up");
            return;
        }
        if fresh {
            match client.init_admin(credentials).await {
                Ok(()) => info!("Management admin account initialized"),
                Err(e) => warn!(error = %e, "Could not initialize management admin account"),
            }
        }
    }

    // =========================================================================
    // PER-STACK PIPELINE
    // =========================================================================

    async fn install_one(
        &mut self,
        id: &'static str,
        base_domain: &str,
        prefixes: &PrefixMap,
        backend: &dyn DeployBackend,
    ) -> DeploymentResult {
        if self.cancel.is_cancelled() {
            return DeploymentResult::cancelled(id);
        }
        let prepared = match self.prepare(id, base_domain, prefixes).await {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };
        let result = deploy_step(prepared, backend).await;
        readiness_step(result, &self.readiness, self.wait_timeout(), &self.cancel).await
    }

    /// Everything up to the deploy call. `Err` carries the final result of
    /// a stack that stops here.
    async fn prepare(
        &mut self,
        id: &'static str,
        base_domain: &str,
        prefixes: &PrefixMap,
    ) -> Result<Prepared, DeploymentResult> {
        let descriptor = self
            .catalog
            .require(id)
            .map_err(|e| failed(id, e.into()))?;
        if template_for(id).is_none() {
            warn!(stack = id, "No manifest variant, skipping");
            return Err(DeploymentResult::skipped_unimplemented(id));
        }

        self.secrets
            .ensure_for_stack(id)
            .map_err(|e| failed(id, e))?;
        let manifest = generate(descriptor, base_domain, prefixes, self.secrets.config())
            .map_err(|e| failed(id, e.into()))?;
        let sources = self
            .write_config_sources(id, &manifest.config_sources)
            .map_err(|e| failed(id, e))?;
        let report = self
            .provisioner
            .ensure_for_stack(descriptor, &sources)
            .await
            .map_err(|e| failed(id, e))?;
        info!(stack = id, resources = report.len(), "Resources provisioned");

        Ok(Prepared {
            id,
            fingerprint: manifest.fingerprint(),
            manifest: manifest.text,
        })
    }

    /// `configs/<stack>/<file>` for every rendered config source.
    fn write_config_sources(
        &self,
        id: &str,
        sources: &[ConfigSource],
    ) -> Result<BTreeMap<String, PathBuf>, DeployError> {
        let dir = self.state.configs_dir().join(id);
        sources
            .iter()
            .map(|source| {
                let path = dir.join(source.file_name);
                write_private(&path, source.content.as_bytes())?;
                Ok((source.name.to_string(), path))
            })
            .collect()
    }

    fn wait_timeout(&self) -> Option<Duration> {
        self.options.wait.then_some(self.options.timeout)
    }

    // =========================================================================
    // PARALLEL MODE
    // =========================================================================

    async fn run_parallel(
        &mut self,
        remaining: &[(usize, &'static str)],
        base_domain: &str,
        prefixes: &PrefixMap,
        backend: Arc<dyn DeployBackend>,
        slots: &mut [Option<DeploymentResult>],
    ) {
        let mut prepared = Vec::new();
        for &(pos, id) in remaining {
            if self.cancel.is_cancelled() {
                slots[pos] = Some(DeploymentResult::cancelled(id));
                continue;
            }
            match self.prepare(id, base_domain, prefixes).await {
                Ok(p) => prepared.push((pos, p)),
                Err(result) => slots[pos] = Some(result),
            }
        }

        // One completion signal per prepared stack. Stacks that stopped
        // during preparation have none, so their dependents do not wait.
        let mut senders = BTreeMap::new();
        let mut receivers = BTreeMap::new();
        for (_, p) in &prepared {
            let (tx, rx) = watch::channel(false);
            senders.insert(p.id, tx);
            receivers.insert(p.id, rx);
        }

        let mut handles = Vec::with_capacity(prepared.len());
        for (pos, p) in prepared {
            let id = p.id;
            let dependencies: Vec<watch::Receiver<bool>> = self
                .catalog
                .get(id)
                .map(|d| {
                    d.dependencies
                        .iter()
                        .filter_map(|dep| receivers.get(dep).cloned())
                        .collect()
                })
                .unwrap_or_default();
            let done = senders.remove(id);
            let backend = Arc::clone(&backend);
            let readiness = Arc::clone(&self.readiness);
            let cancel = self.cancel.clone();
            let wait = self.wait_timeout();

            let handle = tokio::spawn(async move {
                for rx in dependencies {
                    tokio::select! {
                        () = dependency_deployed(rx) => {}
                        () = cancel.cancelled() => {}
                    }
                }
                if cancel.is_cancelled() {
                    return DeploymentResult::cancelled(id);
                }
                let result = deploy_step(p, backend.as_ref()).await;
                if let Some(tx) = done {
                    tx.send_replace(true);
                }
                readiness_step(result, &readiness, wait, &cancel).await
            });
            handles.push((pos, id, handle));
        }
        drop(receivers);

        for (pos, id, handle) in handles {
            slots[pos] = Some(handle.await.unwrap_or_else(|e| {
                DeploymentResult::failed(id, format!("deployment task aborted: {e}"))
            }));
        }
    }
}

// =============================================================================
// STEPS SHARED BY BOTH MODES
// =============================================================================

async fn deploy_step(prepared: Prepared, backend: &dyn DeployBackend) -> DeploymentResult {
    match backend.deploy(prepared.id, &prepared.manifest).await {
        Ok(used) => {
            info!(stack = prepared.id, backend = used, "Stack deployed");
            DeploymentResult::deployed(prepared.id, used).with_fingerprint(prepared.fingerprint)
        }
        Err(e) => failed(prepared.id, e),
    }
}

/// Readiness never fails a stack; a timeout is recorded as a warning.
async fn readiness_step(
    result: DeploymentResult,
    readiness: &ReadinessChecker,
    wait: Option<Duration>,
    cancel: &CancellationToken,
) -> DeploymentResult {
    let Some(timeout) = wait else {
        return result;
    };
    if result.status != DeploymentStatus::Deployed {
        return result;
    }
    let id = result.id.clone();
    let ready = tokio::select! {
        ready = readiness.await_ready(&id, timeout) => ready,
        () = cancel.cancelled() => return result,
    };
    if ready {
        return result.ready();
    }
    let warning = DeployError::ReadinessTimeout {
        stack: id,
        secs: timeout.as_secs(),
    };
    result.not_ready(warning.to_string())
}

/// Resolves once the dependency's deploy call returned, or its task is gone.
async fn dependency_deployed(mut rx: watch::Receiver<bool>) {
    loop {
        let done = *rx.borrow_and_update();
        if done || rx.changed().await.is_err() {
            return;
        }
    }
}
