//! # Core Type Definitions
//!
//! This module contains the value types shared by every layer of Stackforge:
//! - Stack descriptors and installation profiles (`StackDescriptor`, `InstallationProfile`)
//! - Stack and resource classification (`Category`, `ResourceKind`)
//! - Per-run outcomes (`DeploymentStatus`, `DeploymentResult`)
//! - Error types (`StackforgeError`)
//!
//! ## Determinism Guarantees
//!
//! Descriptors are `'static` data defined once in the catalog table.
//! Everything that needs ordering implements `Ord` so it can live in
//! `BTreeMap`/`BTreeSet`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Broad role of a stack inside an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Ingress, management UI and other cluster plumbing.
    Infrastructure,
    /// Stateful data services other stacks connect to.
    Database,
    /// End-user applications.
    Application,
    /// Metrics, dashboards and log viewers.
    Monitoring,
}

impl Category {
    /// Get the lowercase name of the category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::Database => "database",
            Self::Application => "application",
            Self::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of shared cluster object a stack references as `external`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Network,
    Volume,
    Config,
}

impl ResourceKind {
    /// Get the lowercase name of the resource kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Volume => "volume",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STACK DESCRIPTOR
// =============================================================================

/// Static description of one deployable stack.
///
/// Descriptors are defined once in the catalog table and are read-only
/// thereafter. The `const fn` builders allow the whole table to be built at
/// compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescriptor {
    /// Unique, immutable identifier (also the cluster stack name).
    pub id: &'static str,
    /// Role of the stack.
    pub category: Category,
    /// Human description.
    pub description: &'static str,
    /// Default domain-name label of the public service.
    pub domain_prefix: &'static str,
    /// Default domain-name label of a secondary console, if any.
    pub console_prefix: Option<&'static str>,
    /// Ids of stacks that must be deployed first.
    pub dependencies: &'static [&'static str],
    /// External volumes referenced by the manifest.
    pub required_volumes: &'static [&'static str],
    /// External networks referenced by the manifest.
    pub required_networks: &'static [&'static str],
    /// External named configs referenced by the manifest.
    pub required_configs: &'static [&'static str],
}

impl StackDescriptor {
    /// Create a descriptor whose domain prefix equals its id and which has
    /// no dependencies or resources.
    #[must_use]
    pub const fn new(id: &'static str, category: Category, description: &'static str) -> Self {
        Self {
            id,
            category,
            description,
            domain_prefix: id,
            console_prefix: None,
            dependencies: &[],
            required_volumes: &[],
            required_networks: &[],
            required_configs: &[],
        }
    }

    #[must_use]
    pub const fn prefix(mut self, prefix: &'static str) -> Self {
        self.domain_prefix = prefix;
        self
    }

    #[must_use]
    pub const fn console(mut self, prefix: &'static str) -> Self {
        self.console_prefix = Some(prefix);
        self
    }

    #[must_use]
    pub const fn depends_on(mut self, ids: &'static [&'static str]) -> Self {
        self.dependencies = ids;
        self
    }

    #[must_use]
    pub const fn volumes(mut self, names: &'static [&'static str]) -> Self {
        self.required_volumes = names;
        self
    }

    #[must_use]
    pub const fn networks(mut self, names: &'static [&'static str]) -> Self {
        self.required_networks = names;
        self
    }

    #[must_use]
    pub const fn configs(mut self, names: &'static [&'static str]) -> Self {
        self.required_configs = names;
        self
    }

    /// All shared resources this stack needs, networks first, then volumes,
    /// then configs.
    pub fn required_resources(&self) -> impl Iterator<Item = (ResourceKind, &'static str)> + '_ {
        let networks = self
            .required_networks
            .iter()
            .map(|n| (ResourceKind::Network, *n));
        let volumes = self
            .required_volumes
            .iter()
            .map(|v| (ResourceKind::Volume, *v));
        let configs = self
            .required_configs
            .iter()
            .map(|c| (ResourceKind::Config, *c));
        networks.chain(volumes).chain(configs)
    }
}

// =============================================================================
// INSTALLATION PROFILE
// =============================================================================

/// A named, ordered selection of stacks representing a canned install size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallationProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub stacks: &'static [&'static str],
}

// =============================================================================
// DEPLOYMENT RESULT
// =============================================================================

/// Outcome of one stack within an installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    Deployed,
    Failed,
    /// The catalog knows the stack but no manifest variant exists for it.
    SkippedUnimplemented,
    /// The run was cancelled before this stack was started.
    Cancelled,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::SkippedUnimplemented => "skipped-unimplemented",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Per-stack record collected for the final run summary. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub id: String,
    pub status: DeploymentStatus,
    /// Error detail or a warning for the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Which backend performed the deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// `Some(false)` means the readiness check timed out (a warning only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl DeploymentResult {
    fn with_status(id: impl Into<String>, status: DeploymentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            detail: None,
            backend: None,
            ready: None,
            fingerprint: None,
        }
    }

    #[must_use]
    pub fn deployed(id: impl Into<String>, backend: impl Into<String>) -> Self {
        let mut result = Self::with_status(id, DeploymentStatus::Deployed);
        result.backend = Some(backend.into());
        result
    }

    #[must_use]
    pub fn failed(id: impl Into<String>, detail: impl Into<String>) -> Self {
        let mut result = Self::with_status(id, DeploymentStatus::Failed);
        result.detail = Some(detail.into());
        result
    }

    #[must_use]
    pub fn skipped_unimplemented(id: impl Into<String>) -> Self {
        let mut result = Self::with_status(id, DeploymentStatus::SkippedUnimplemented);
        result.detail = Some("no manifest variant for this stack".to_string());
        result
    }

    #[must_use]
    pub fn cancelled(id: impl Into<String>) -> Self {
        let mut result = Self::with_status(id, DeploymentStatus::Cancelled);
        result.detail = Some("cancelled before start".to_string());
        result
    }

    #[must_use]
    pub fn ready(mut self) -> Self {
        self.ready = Some(true);
        self
    }

    /// Record a readiness timeout. It stays a warning: the status is left
    /// untouched.
    #[must_use]
    pub fn not_ready(mut self, warning: impl Into<String>) -> Self {
        self.ready = Some(false);
        self.detail = Some(warning.into());
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == DeploymentStatus::Failed
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the planning layer.
///
/// Catalog-configuration errors (`UnknownDependency`, `DependencyCycle`,
/// `DuplicateStack`) are fatal and surface before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackforgeError {
    /// A requested stack id is not in the catalog.
    #[error("Unknown stack: {0}")]
    UnknownStack(String),

    /// A descriptor references a dependency id that is not in the catalog.
    #[error("Stack '{stack}' depends on unknown stack '{dependency}'")]
    UnknownDependency { stack: String, dependency: String },

    /// A stack transitively depends on itself. The path starts and ends
    /// with the same id.
    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// Two descriptors share an id.
    #[error("Duplicate stack id: {0}")]
    DuplicateStack(String),

    /// The requested installation profile does not exist.
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// The catalog knows the stack but no manifest variant exists for it.
    #[error("No manifest variant for stack: {0}")]
    Unimplemented(String),

    /// A manifest needs a secret that has not been generated yet.
    #[error("Stack '{stack}' needs secret '{key}' which is not in the deployment config")]
    MissingSecret { stack: String, key: String },

    /// A required global setting (base domain, contact email) is absent.
    #[error("Missing configuration value '{0}'")]
    MissingSetting(String),

    /// Rendering a manifest to text failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: StackDescriptor = StackDescriptor::new("minio", Category::Database, "S3")
        .console("console.minio")
        .networks(&["externa", "interna"])
        .volumes(&["minio_data"])
        .configs(&["config_minio"]);

    #[test]
    fn descriptor_prefix_defaults_to_id() {
        assert_eq!(SAMPLE.domain_prefix, "minio");
        assert_eq!(SAMPLE.console_prefix, Some("console.minio"));
    }

    #[test]
    fn required_resources_are_grouped_by_kind() {
        let resources: Vec<_> = SAMPLE.required_resources().collect();
        assert_eq!(
            resources,
            vec![
                (ResourceKind::Network, "externa"),
                (ResourceKind::Network, "interna"),
                (ResourceKind::Volume, "minio_data"),
                (ResourceKind::Config, "config_minio"),
            ]
        );
    }

    #[test]
    fn cycle_error_names_the_path() {
        let err = StackforgeError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
    }

    #[test]
    fn readiness_timeout_is_a_warning_not_a_failure() {
        let result = DeploymentResult::deployed("grafana", "cli").not_ready("not ready after 60s");
        assert_eq!(result.status, DeploymentStatus::Deployed);
        assert!(!result.is_failure());
        assert_eq!(result.ready, Some(false));
        assert!(result.detail.is_some_and(|d| d.contains("60s")));

        let ready = DeploymentResult::deployed("grafana", "cli").ready();
        assert_eq!(ready.ready, Some(true));
        assert!(ready.detail.is_none());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_yaml::to_string(&DeploymentStatus::SkippedUnimplemented)
            .expect("serialize status");
        assert_eq!(json.trim(), "skipped-unimplemented");
    }
}
