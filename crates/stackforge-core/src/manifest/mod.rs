//! # Manifest Generator
//!
//! Pure function from (descriptor, base domain, prefix map, secret map) to
//! manifest text. One `StackTemplate` variant per stack describes the
//! services; this module adds the shared parts every manifest carries:
//!
//! - top-level `external` declarations for exactly the networks, volumes
//!   and configs named by the descriptor
//! - rendering through the typed compose model, so identical inputs give
//!   byte-identical text
//!
//! Variants never generate secrets. A key missing from the secret map is
//! a `MissingSecret` error; the app fills the map before calling in here.

pub mod compose;
pub mod prefix;
mod stacks;

pub use compose::{ComposeFile, ExternalRef, Route, Service};
pub use prefix::{PrefixMap, console_key};

use crate::secrets::DeploymentConfig;
use crate::types::{StackDescriptor, StackforgeError};
use std::collections::BTreeMap;

// =============================================================================
// CONTEXT
// =============================================================================

/// Inputs shared by every variant during one generation.
#[derive(Debug, Clone, Copy)]
pub struct ManifestContext<'a> {
    pub stack: &'static str,
    pub base_domain: &'a str,
    pub prefixes: &'a PrefixMap,
    pub secrets: &'a DeploymentConfig,
}

impl<'a> ManifestContext<'a> {
    /// `<label>.<base_domain>` for a prefix key (`<id>` or `<id>_console`).
    #[must_use]
    pub fn host(&self, key: &str) -> String {
        self.prefixes.host_for(key, self.base_domain)
    }

    /// Host of the stack's own public service.
    #[must_use]
    pub fn own_host(&self) -> String {
        self.host(self.stack)
    }

    /// A required secret, owned by this stack or one of its dependencies.
    pub fn secret(&self, key: &str) -> Result<&'a str, StackforgeError> {
        self.secrets
            .get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StackforgeError::MissingSecret {
                stack: self.stack.to_string(),
                key: key.to_string(),
            })
    }

    /// A required global setting such as the ACME email.
    pub fn setting(&self, key: &str) -> Result<&'a str, StackforgeError> {
        self.optional(key)
            .ok_or_else(|| StackforgeError::MissingSetting(key.to_string()))
    }

    /// An optional setting; empty values count as absent.
    #[must_use]
    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.secrets.get(key).filter(|v| !v.is_empty())
    }
}

// =============================================================================
// VARIANTS
// =============================================================================

/// Source of a named config object, rendered as data. The app writes it to
/// disk and creates the config from that file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub name: &'static str,
    pub file_name: &'static str,
    pub content: String,
}

/// One manifest variant.
pub trait StackTemplate: Send + Sync {
    /// Stack id this variant renders.
    fn name(&self) -> &'static str;

    /// Services keyed by service name.
    fn services(
        &self,
        ctx: &ManifestContext<'_>,
    ) -> Result<BTreeMap<String, Service>, StackforgeError>;

    /// Named-config sources the stack needs created before deployment.
    fn config_sources(
        &self,
        _ctx: &ManifestContext<'_>,
    ) -> Result<Vec<ConfigSource>, StackforgeError> {
        Ok(Vec::new())
    }
}

/// Variant registered for `id`, if any.
#[must_use]
pub fn template_for(id: &str) -> Option<&'static dyn StackTemplate> {
    stacks::TEMPLATES.iter().copied().find(|t| t.name() == id)
}

/// Ids of every stack with a manifest variant.
pub fn implemented() -> impl Iterator<Item = &'static str> {
    stacks::TEMPLATES.iter().map(|t| t.name())
}

// =============================================================================
// GENERATION
// =============================================================================

/// A rendered manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub stack: &'static str,
    pub text: String,
    pub config_sources: Vec<ConfigSource>,
}

impl Manifest {
    /// BLAKE3 digest of the manifest text, hex encoded.
    #[cfg(feature = "crypto-hash")]
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        Some(blake3::hash(self.text.as_bytes()).to_hex().to_string())
    }

    /// Fingerprinting needs the `crypto-hash` feature.
    #[cfg(not(feature = "crypto-hash"))]
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        None
    }
}

/// Generate the manifest of one stack.
///
/// # Errors
///
/// - `MissingSetting` if `base_domain` is empty or a variant needs a global
///   setting that is absent
/// - `Unimplemented` if no variant exists for the stack
/// - `MissingSecret` if a secret the variant references is absent
pub fn generate(
    descriptor: &StackDescriptor,
    base_domain: &str,
    prefixes: &PrefixMap,
    secrets: &DeploymentConfig,
) -> Result<Manifest, StackforgeError> {
    let ctx = ManifestContext {
        stack: descriptor.id,
        base_domain,
        prefixes,
        secrets,
    };
    let template = template_for(descriptor.id)
        .ok_or_else(|| StackforgeError::Unimplemented(descriptor.id.to_string()))?;

    let compose = compose_file(descriptor, template, &ctx)?;
    Ok(Manifest {
        stack: descriptor.id,
        text: compose.to_yaml()?,
        config_sources: template.config_sources(&ctx)?,
    })
}

/// Typed model of the manifest before rendering.
pub fn compose_file(
    descriptor: &StackDescriptor,
    template: &dyn StackTemplate,
    ctx: &ManifestContext<'_>,
) -> Result<ComposeFile, StackforgeError> {
    if ctx.base_domain.is_empty() {
        return Err(StackforgeError::MissingSetting(
            crate::secrets::BASE_DOMAIN_KEY.to_string(),
        ));
    }

    let mut compose = ComposeFile::new(template.services(ctx)?);
    let external = |names: &[&str]| {
        names
            .iter()
            .map(|n| ((*n).to_string(), ExternalRef::EXTERNAL))
            .collect::<BTreeMap<_, _>>()
    };
    compose.networks = external(descriptor.required_networks);
    compose.volumes = external(descriptor.required_volumes);
    compose.configs = external(descriptor.required_configs);
    Ok(compose)
}

// =============================================================================
// TESTS
// =============================================================================
