//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::cluster::{Cluster, DockerCli, MemoryCluster, ServiceReplicas};
use crate::error::DeployError;
use crate::installer::{InstallOptions, Installer, RunSummary};
use crate::management::ManagementClient;
use crate::readiness::all_ready;
use crate::settings::{BackendMode, Settings, StateDir};
use crate::store::{ConfigStore, JsonFileStore, MemoryStore, SecretStore};
use serde::Serialize;
use stackforge_core::{
    ACME_EMAIL_KEY, BASE_DOMAIN_KEY, Catalog, Category, DNS_API_TOKEN_KEY, PrefixMap,
    SECRET_POLICY, StackforgeError, deployment_waves, generate, implemented, install_order,
    resolve,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// =============================================================================
// SHARED CONTEXT
// =============================================================================

/// State directory, settings and output mode shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub state: StateDir,
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn new(home: Option<PathBuf>, json: bool) -> Result<Self, DeployError> {
        let state = StateDir::locate(home);
        let settings = Settings::load(&state)?;
        Ok(Self {
            state,
            settings,
            json,
        })
    }

    fn cluster(&self) -> Arc<dyn Cluster> {
        Arc::new(DockerCli::new(self.settings.command_timeout()))
    }

    fn config_store(&self) -> JsonFileStore {
        JsonFileStore::new(self.state.config_path())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DeployError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| StackforgeError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Explicit ids plus the stacks of `profile`, in that order.
pub fn requested_ids(
    catalog: &Catalog,
    stacks: &[String],
    profile: Option<&str>,
) -> Result<Vec<String>, DeployError> {
    let mut ids = Vec::new();
    if let Some(name) = profile {
        ids.extend(catalog.profile(name)?.stacks.iter().map(|s| (*s).to_string()));
    }
    ids.extend(stacks.iter().cloned());
    if ids.is_empty() {
        return Err(DeployError::Settings(
            "nothing requested: pass stack ids or --profile".to_string(),
        ));
    }
    Ok(ids)
}

// =============================================================================
// CATALOG / PROFILES / PLAN
// =============================================================================

#[derive(Serialize)]
struct CatalogEntry<'a> {
    id: &'a str,
    category: Category,
    description: &'a str,
    prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    console_prefix: Option<&'a str>,
    dependencies: &'a [&'a str],
    implemented: bool,
}

/// List every known stack.
pub fn cmd_catalog(ctx: &Context) -> Result<(), DeployError> {
    let catalog = Catalog::builtin();
    let implemented: Vec<&str> = implemented().collect();
    let entries: Vec<CatalogEntry<'_>> = catalog
        .descriptors()
        .map(|d| CatalogEntry {
            id: d.id,
            category: d.category,
            description: d.description,
            prefix: d.domain_prefix,
            console_prefix: d.console_prefix,
            dependencies: d.dependencies,
            implemented: implemented.contains(&d.id),
        })
        .collect();

    if ctx.json {
        return print_json(&entries);
    }

    println!("{:<12} {:<15} {:<10} {:<22} DESCRIPTION", "ID", "CATEGORY", "PREFIX", "DEPENDS ON");
    for e in &entries {
        let marker = if e.implemented { "" } else { " (no manifest)" };
        println!(
            "{:<12} {:<15} {:<10} {:<22} {}{}",
            e.id,
            e.category,
            e.prefix,
            e.dependencies.join(","),
            e.description,
            marker
        );
    }
    Ok(())
}

/// List installation profiles.
pub fn cmd_profiles(ctx: &Context) -> Result<(), DeployError> {
    let catalog = Catalog::builtin();

    if ctx.json {
        let profiles: BTreeMap<&str, &[&str]> =
            catalog.profiles().iter().map(|p| (p.name, p.stacks)).collect();
        return print_json(&profiles);
    }

    for profile in catalog.profiles() {
        println!("{:<12} {}", profile.name, profile.description);
        println!("{:<12} {}", "", profile.stacks.join(", "));
    }
    Ok(())
}

#[derive(Serialize)]
struct PlanOutput {
    order: Vec<&'static str>,
    waves: Vec<Vec<&'static str>>,
}

/// Show the resolved install order and the waves a parallel run would use.
pub fn cmd_plan(
    ctx: &Context,
    stacks: &[String],
    profile: Option<&str>,
) -> Result<(), DeployError> {
    let catalog = Catalog::builtin();
    catalog.validate()?;
    let ids = requested_ids(&catalog, stacks, profile)?;
    let order = install_order(&catalog, &ids)?;
    let plan = PlanOutput {
        waves: deployment_waves(&catalog, &order),
        order,
    };

    if ctx.json {
        return print_json(&plan);
    }

    println!("Install order:");
    for (i, id) in plan.order.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, id);
    }
    println!();
    println!("Parallel waves:");
    for (i, wave) in plan.waves.iter().enumerate() {
        println!("  {:>2}: {}", i + 1, wave.join(", "));
    }
    Ok(())
}

// =============================================================================
// RENDER
// =============================================================================

#[derive(Serialize)]
struct RenderOutput<'a> {
    stack: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    manifest: &'a str,
    config_sources: Vec<&'a str>,
}

/// Print the manifest of one stack. Secrets not stored yet are filled with
/// temporary values that are never written back.
pub fn cmd_render(ctx: &Context, stack: &str) -> Result<(), DeployError> {
    let catalog = Catalog::builtin();
    let descriptor = catalog.require(stack)?;
    let config = ctx.config_store().load()?;
    let base_domain = config
        .get(BASE_DOMAIN_KEY)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| StackforgeError::MissingSetting(BASE_DOMAIN_KEY.to_string()))?
        .to_string();

    let mut secrets = SecretStore::open(MemoryStore::new(config))?;
    let mut temporary = Vec::new();
    for id in resolve(&catalog, [stack])? {
        temporary.extend(secrets.ensure_for_stack(id)?);
    }
    if !temporary.is_empty() {
        warn!(keys = ?temporary, "Rendering with temporary values for secrets not stored yet");
    }

    let prefixes = PrefixMap::from_catalog(&catalog).with_overrides(ctx.settings.prefixes.iter());
    let manifest = generate(descriptor, &base_domain, &prefixes, secrets.config())?;

    if ctx.json {
        return print_json(&RenderOutput {
            stack,
            fingerprint: manifest.fingerprint(),
            manifest: &manifest.text,
            config_sources: manifest.config_sources.iter().map(|s| s.name).collect(),
        });
    }

    print!("{}", manifest.text);
    if let Some(fingerprint) = manifest.fingerprint() {
        println!("# fingerprint: {}", fingerprint);
    }
    for source in &manifest.config_sources {
        println!("# config {} <- {}", source.name, source.file_name);
    }
    Ok(())
}

// =============================================================================
// CONFIGURE / ROTATE
// =============================================================================

#[derive(Serialize)]
struct ConfigureOutput<'a> {
    base_domain: Option<&'a str>,
    acme_email: Option<&'a str>,
    dns_token_set: bool,
    stored_keys: usize,
}

/// Store installation-wide settings, then show what is stored.
pub fn cmd_configure(
    ctx: &Context,
    domain: Option<String>,
    email: Option<String>,
    dns_token: Option<String>,
) -> Result<(), DeployError> {
    let mut store = SecretStore::open(ctx.config_store())?;

    if let Some(domain) = domain {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() || !domain.contains('.') {
            return Err(DeployError::Settings(format!("'{domain}' is not a domain name")));
        }
        store.set(BASE_DOMAIN_KEY, &domain)?;
    }
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(DeployError::Settings(format!("'{email}' is not an email address")));
        }
        store.set(ACME_EMAIL_KEY, email.trim())?;
    }
    if let Some(token) = dns_token {
        store.set(DNS_API_TOKEN_KEY, token.trim())?;
    }

    let config = store.config();
    let output = ConfigureOutput {
        base_domain: config.get(BASE_DOMAIN_KEY),
        acme_email: config.get(ACME_EMAIL_KEY),
        dns_token_set: config.contains(DNS_API_TOKEN_KEY),
        stored_keys: config.len(),
    };

    if ctx.json {
        return print_json(&output);
    }

    println!("State:       {}", ctx.state.root().display());
    println!("Base domain: {}", output.base_domain.unwrap_or("(not set)"));
    println!("ACME email:  {}", output.acme_email.unwrap_or("(not set)"));
    println!("DNS token:   {}", if output.dns_token_set { "set" } else { "not set" });
    println!("Stored keys: {}", output.stored_keys);
    Ok(())
}

/// Replace one stored secret. The value is never printed.
pub fn cmd_rotate(ctx: &Context, key: &str) -> Result<(), DeployError> {
    let mut store = SecretStore::open(ctx.config_store())?;
    store.rotate(key)?;
    let owner = SECRET_POLICY
        .iter()
        .find(|(_, specs)| specs.iter().any(|s| s.key == key))
        .map(|(id, _)| *id);

    if ctx.json {
        return print_json(&serde_json::json!({ "rotated": key, "stack": owner }));
    }

    println!("Rotated {}", key);
    if let Some(owner) = owner {
        println!("Reinstall '{}' to apply the new value.", owner);
    }
    Ok(())
}

// =============================================================================
// INSTALL
// =============================================================================

/// Parsed arguments of `install`.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub stacks: Vec<String>,
    pub profile: Option<String>,
    pub parallel: bool,
    pub dry_run: bool,
    pub wait: bool,
    pub timeout: Option<u64>,
    pub backend: Option<BackendMode>,
    pub prefixes: BTreeMap<String, String>,
}

/// Install stacks or a profile.
pub async fn cmd_install(
    ctx: Context,
    request: InstallRequest,
    cancel: CancellationToken,
) -> Result<(), DeployError> {
    let catalog = Catalog::builtin();
    let ids = requested_ids(&catalog, &request.stacks, request.profile.as_deref())?;

    let mut settings = ctx.settings.clone();
    if let Some(backend) = request.backend {
        settings.backend = backend;
    }
    let options = InstallOptions {
        parallel: request.parallel,
        wait: request.wait,
        timeout: request
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| settings.readiness_timeout()),
        prefixes: request.prefixes,
    };

    let mut dry_cluster = None;
    let installer = if request.dry_run {
        let cluster = Arc::new(MemoryCluster::new());
        dry_cluster = Some(Arc::clone(&cluster));
        let secrets = SecretStore::open(MemoryStore::new(ctx.config_store().load()?))?;
        let state = StateDir::new(ctx.state.root().join("dry-run"));
        info!(state = %state.root().display(), "Dry run against an in-memory cluster");
        Installer::new(catalog, cluster, secrets, state, settings)
    } else {
        let secrets = SecretStore::open(ctx.config_store())?;
        let management = match settings.backend {
            BackendMode::Auto => Some(ManagementClient::new(settings.api_url.as_str())?),
            BackendMode::Cli => None,
        };
        let installer =
            Installer::new(catalog, ctx.cluster(), secrets, ctx.state.clone(), settings);
        match management {
            Some(client) => installer.with_management(client),
            None => installer,
        }
    };

    let mut installer = installer.with_options(options).with_cancel(cancel);
    let summary = installer.run(&ids).await?;

    if ctx.json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
        if let Some(cluster) = dry_cluster {
            println!();
            println!("Dry run, nothing was changed. Would create:");
            for (kind, name) in cluster.created() {
                println!("  {:<8} {}", kind, name);
            }
            println!("Would deploy: {}", cluster.deployed().join(", "));
        }
    }

    let failed = summary.failures().count();
    if failed > 0 {
        return Err(DeployError::RunFailed { failed });
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{:<12} {:<22} {:<8} DETAIL", "STACK", "STATUS", "BACKEND");
    for r in &summary.results {
        let ready = match r.ready {
            Some(true) => " (ready)",
            Some(false) => " (not ready)",
            None => "",
        };
        println!(
            "{:<12} {:<22} {:<8} {}",
            r.id,
            format!("{}{}", r.status, ready),
            r.backend.as_deref().unwrap_or("-"),
            r.detail.as_deref().unwrap_or("")
        );
    }
}

// =============================================================================
// STATUS / REMOVE / LOGS
// =============================================================================

/// Show deployed stacks and their replicas.
pub async fn cmd_status(ctx: &Context) -> Result<(), DeployError> {
    let cluster = ctx.cluster();
    let mut stacks: BTreeMap<String, Vec<ServiceReplicas>> = BTreeMap::new();
    for stack in cluster.list_stacks().await? {
        let services = cluster.stack_services(&stack).await?;
        stacks.insert(stack, services);
    }

    if ctx.json {
        return print_json(&stacks);
    }

    if stacks.is_empty() {
        println!("No stacks deployed.");
        return Ok(());
    }
    for (stack, services) in &stacks {
        let state = if all_ready(services) { "ready" } else { "converging" };
        println!("{} [{}]", stack, state);
        for s in services {
            println!("  {:<36} {}/{}", s.name, s.running, s.desired);
        }
    }
    Ok(())
}

/// Remove one deployed stack. Shared networks and volumes are kept.
pub async fn cmd_remove(ctx: &Context, stack: &str) -> Result<(), DeployError> {
    ctx.cluster().remove_stack(stack).await?;
    info!(stack, "Stack removed");
    if ctx.json {
        return print_json(&serde_json::json!({ "removed": stack }));
    }
    println!("Removed {} (volumes and networks kept)", stack);
    Ok(())
}

/// Show the logs of one service.
pub async fn cmd_logs(ctx: &Context, service: &str, tail: usize) -> Result<(), DeployError> {
    let logs = ctx.cluster().service_logs(service, tail).await?;
    if ctx.json {
        let lines: Vec<&str> = logs.lines().collect();
        return print_json(&serde_json::json!({ "service": service, "lines": lines }));
    }
    print!("{}", logs);
    Ok(())
}
