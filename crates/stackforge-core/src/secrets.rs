//! # Deployment Config and Secret Policy
//!
//! `DeploymentConfig` is the persistent key/value map holding the base
//! domain, the reverse-proxy contact email, external-DNS credentials and one
//! generated secret per stateful stack. This module only defines the value
//! type and the policy table saying which keys each stack needs and how to
//! generate them. Loading, saving and random generation live in the app.

use crate::primitives::{
    ADMIN_PASSWORD_LENGTH, API_KEY_LENGTH, DEFAULT_SECRET_LENGTH, FRAMEWORK_KEY_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// WELL-KNOWN GLOBAL KEYS
// =============================================================================

/// Base domain every routing rule is built on.
pub const BASE_DOMAIN_KEY: &str = "base_domain";

/// Contact email for ACME certificate registration.
pub const ACME_EMAIL_KEY: &str = "acme_email";

/// Optional external-DNS API token. When present the reverse proxy uses the
/// DNS challenge instead of the HTTP challenge.
pub const DNS_API_TOKEN_KEY: &str = "dns_api_token";

// =============================================================================
// DEPLOYMENT CONFIG
// =============================================================================

/// Flat string-to-string map persisted across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentConfig {
    values: BTreeMap<String, String>,
}

impl DeploymentConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Present and non-empty.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Insert or overwrite one key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Merge `other` into `self`; keys of `other` win.
    pub fn merge(&mut self, other: DeploymentConfig) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

// =============================================================================
// SECRET POLICY
// =============================================================================

/// How the value of one key is produced on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Generic password, default length.
    Password,
    /// Administrator password of a web console.
    AdminPassword,
    /// API key handed to clients.
    ApiKey,
    /// Framework signing key (session cookies, tokens).
    FrameworkKey,
    /// Not a secret: a parameter with a fixed default value.
    Default(&'static str),
}

impl SecretKind {
    /// Length of the random string to generate, `None` for fixed defaults.
    #[must_use]
    pub const fn length(self) -> Option<usize> {
        match self {
            Self::Password => Some(DEFAULT_SECRET_LENGTH),
            Self::AdminPassword => Some(ADMIN_PASSWORD_LENGTH),
            Self::ApiKey => Some(API_KEY_LENGTH),
            Self::FrameworkKey => Some(FRAMEWORK_KEY_LENGTH),
            Self::Default(_) => None,
        }
    }
}

/// One key a stack owns in the deployment config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretSpec {
    pub key: &'static str,
    pub kind: SecretKind,
}

const fn spec(key: &'static str, kind: SecretKind) -> SecretSpec {
    SecretSpec { key, kind }
}

/// Keys owned (and therefore generated) by each stack.
///
/// Stacks that read another stack's secret (pgbouncer reads
/// `postgres_password`) do not list it here; the resolver guarantees the
/// owner is processed first.
pub const SECRET_POLICY: &[(&str, &[SecretSpec])] = &[
    ("postgres", &[spec("postgres_password", SecretKind::Password)]),
    ("redis", &[spec("redis_password", SecretKind::Password)]),
    ("pgvector", &[spec("pgvector_password", SecretKind::Password)]),
    (
        "minio",
        &[
            spec("minio_root_user", SecretKind::Default("minioadmin")),
            spec("minio_root_password", SecretKind::Password),
        ],
    ),
    (
        "rabbitmq",
        &[
            spec("rabbitmq_user", SecretKind::Default("admin")),
            spec("rabbitmq_password", SecretKind::Password),
        ],
    ),
    ("evolution", &[spec("evolution_api_key", SecretKind::ApiKey)]),
    ("chatwoot", &[spec("chatwoot_secret_key", SecretKind::FrameworkKey)]),
    (
        "directus",
        &[
            spec("directus_key", SecretKind::ApiKey),
            spec("directus_secret", SecretKind::ApiKey),
            spec("directus_admin_password", SecretKind::AdminPassword),
        ],
    ),
    ("grafana", &[spec("grafana_password", SecretKind::AdminPassword)]),
    (
        "dozzle",
        &[
            spec("dozzle_password", SecretKind::AdminPassword),
            spec("dozzle_key", SecretKind::Password),
        ],
    ),
];

/// Keys owned by `stack_id`, empty if it owns none.
#[must_use]
pub fn secrets_for(stack_id: &str) -> &'static [SecretSpec] {
    SECRET_POLICY
        .iter()
        .find(|(id, _)| *id == stack_id)
        .map(|(_, specs)| *specs)
        .unwrap_or(&[])
}

/// Find the policy entry for a key, whichever stack owns it.
#[must_use]
pub fn spec_for_key(key: &str) -> Option<&'static SecretSpec> {
    SECRET_POLICY
        .iter()
        .flat_map(|(_, specs)| specs.iter())
        .find(|s| s.key == key)
}

// =============================================================================
// TESTS
// =============================================================================
