//! # stackforge-core
//!
//! The deterministic planner for Stackforge - THE LOGIC.
//!
//! This crate turns "install these stacks on this domain" into a plan:
//! - `catalog`: which stacks exist, what they need, canned profiles
//! - `resolver`: dependency-first installation order
//! - `secrets`: the deployment-config map and which keys each stack owns
//! - `manifest`: one manifest variant per stack, rendered to text
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network, NO process calls and NO randomness
//! - Identical inputs always give byte-identical manifests
//! - Secrets are inputs, never generated here; the app owns generation
//!   and persistence

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod manifest;
pub mod primitives;
pub mod resolver;
pub mod secrets;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Category, DeploymentResult, DeploymentStatus, InstallationProfile, ResourceKind,
    StackDescriptor, StackforgeError,
};

// =============================================================================
// RE-EXPORTS: Planning
// =============================================================================

pub use catalog::{BUILTIN_PROFILES, BUILTIN_STACKS, Catalog};
pub use resolver::{deployment_waves, install_order, resolve};
pub use secrets::{
    ACME_EMAIL_KEY, BASE_DOMAIN_KEY, DNS_API_TOKEN_KEY, DeploymentConfig, SECRET_POLICY,
    SecretKind, SecretSpec, secrets_for, spec_for_key,
};

// =============================================================================
// RE-EXPORTS: Manifests
// =============================================================================

pub use manifest::{
    ConfigSource, Manifest, ManifestContext, PrefixMap, StackTemplate, generate, implemented,
    template_for,
};
