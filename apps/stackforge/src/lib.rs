//! # stackforge
//!
//! The installer around the deterministic planner - THE BINARY.
//!
//! - `store`: deployment config and management credentials on disk,
//!   secret generation
//! - `cluster`: the orchestrator as a trait (`docker` CLI, in-memory)
//! - `provision`: idempotent networks, volumes and named configs
//! - `backend`: direct CLI deploy, management API deploy, fallback
//! - `readiness`: bounded replica polling
//! - `installer`: the per-run orchestrator
//! - `cli`: clap commands
//!
//! ## Architectural Constraints
//!
//! - Everything async, networked, process-spawning or random lives here;
//!   `stackforge-core` stays pure
//! - Errors local to one stack never abort a run

// =============================================================================
// MODULES
// =============================================================================

pub mod backend;
pub mod cli;
pub mod cluster;
pub mod error;
pub mod installer;
pub mod management;
pub mod provision;
pub mod readiness;
pub mod settings;
pub mod store;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use backend::{ApiBackend, CliBackend, DeployBackend, FallbackBackend};
pub use cluster::{Cluster, DockerCli, MemoryCluster, ServiceReplicas};
pub use error::DeployError;
pub use installer::{InstallOptions, Installer, RunSummary};
pub use management::ManagementClient;
pub use provision::{ProvisionOutcome, Provisioned, Provisioner};
pub use readiness::ReadinessChecker;
pub use settings::{BackendMode, Settings, StackType, StateDir};
pub use store::{
    ConfigStore, CredentialStore, JsonFileStore, ManagementCredentials, MemoryStore, SecretStore,
};
