//! # Stack Catalog
//!
//! Static registry mapping a stack id to its descriptor, plus the canned
//! installation profiles.
//!
//! The built-in table is a `const` array so every descriptor is checked at
//! compile time. `Catalog::from_descriptors` exists for tests and for
//! embedding custom tables; both paths go through the same duplicate check.

use crate::primitives::{AGENT_NETWORK, INTERNAL_NETWORK, PUBLIC_NETWORK};
use crate::resolver;
use crate::types::{Category, InstallationProfile, StackDescriptor, StackforgeError};
use std::collections::BTreeMap;

// =============================================================================
// BUILT-IN TABLE
// =============================================================================

const PUBLIC: &[&str] = &[PUBLIC_NETWORK];
const BOTH: &[&str] = &[PUBLIC_NETWORK, INTERNAL_NETWORK];

/// Every stack Stackforge knows about.
pub const BUILTIN_STACKS: &[StackDescriptor] = &[
    // INFRASTRUCTURE
    StackDescriptor::new(
        "traefik",
        Category::Infrastructure,
        "Reverse proxy with automatic TLS certificates",
    )
    .networks(PUBLIC)
    .volumes(&["traefik_certificates"]),
    StackDescriptor::new(
        "portainer",
        Category::Infrastructure,
        "Cluster management UI and stack API",
    )
    .networks(&[PUBLIC_NETWORK, AGENT_NETWORK])
    .volumes(&["portainer_data"]),
    // DATABASES
    StackDescriptor::new("postgres", Category::Database, "PostgreSQL with a web console")
        .networks(BOTH)
        .volumes(&["postgres_data"]),
    StackDescriptor::new("redis", Category::Database, "Redis with a web console")
        .networks(BOTH)
        .volumes(&["redis_data"]),
    StackDescriptor::new(
        "pgvector",
        Category::Database,
        "PostgreSQL with the pgvector extension",
    )
    .networks(BOTH)
    .volumes(&["pgvector_data"]),
    StackDescriptor::new("pgbouncer", Category::Database, "Connection pooler for postgres")
        .depends_on(&["postgres"])
        .networks(BOTH),
    StackDescriptor::new("minio", Category::Database, "S3-compatible object storage")
        .console("console.minio")
        .networks(BOTH)
        .volumes(&["minio_data"]),
    StackDescriptor::new("rabbitmq", Category::Database, "Message broker with management UI")
        .networks(BOTH)
        .volumes(&["rabbitmq_data"]),
    // APPLICATIONS
    StackDescriptor::new("evolution", Category::Application, "WhatsApp messaging API")
        .depends_on(&["postgres", "redis"])
        .networks(BOTH)
        .volumes(&["evolution_instances"]),
    StackDescriptor::new("chatwoot", Category::Application, "Customer support inbox")
        .depends_on(&["postgres", "redis"])
        .networks(BOTH)
        .volumes(&["chatwoot_storage"]),
    StackDescriptor::new("directus", Category::Application, "Headless CMS and data studio")
        .depends_on(&["postgres", "redis"])
        .networks(BOTH)
        .volumes(&["directus_uploads", "directus_extensions"]),
    StackDescriptor::new("stirlingpdf", Category::Application, "PDF toolbox")
        .prefix("pdf")
        .networks(PUBLIC)
        .volumes(&["stirlingpdf_data", "stirlingpdf_configs"]),
    StackDescriptor::new("n8n", Category::Application, "Workflow automation")
        .depends_on(&["postgres", "redis"])
        .networks(BOTH)
        .volumes(&["n8n_data"]),
    StackDescriptor::new("typebot", Category::Application, "Conversational form builder")
        .depends_on(&["postgres", "minio"])
        .networks(BOTH),
    // MONITORING
    StackDescriptor::new(
        "prometheus",
        Category::Monitoring,
        "Metrics collection with node and container exporters",
    )
        .networks(BOTH)
        .volumes(&["prometheus_data"])
        .configs(&["config_prometheus"]),
    StackDescriptor::new("grafana", Category::Monitoring, "Dashboards")
        .depends_on(&["prometheus"])
        .networks(BOTH)
        .volumes(&["grafana_data"]),
    StackDescriptor::new("dozzle", Category::Monitoring, "Live container log viewer")
        .prefix("logs")
        .networks(PUBLIC)
        .configs(&["config_dozzle"]),
];

/// Canned installation sizes.
pub const BUILTIN_PROFILES: &[InstallationProfile] = &[
    InstallationProfile {
        name: "minimal",
        description: "Reverse proxy and management UI",
        stacks: &["traefik", "portainer"],
    },
    InstallationProfile {
        name: "basic",
        description: "Minimal plus databases and the messaging API",
        stacks: &["traefik", "portainer", "postgres", "redis", "evolution"],
    },
    InstallationProfile {
        name: "full",
        description: "Everything with a manifest",
        stacks: &[
            "traefik",
            "portainer",
            "postgres",
            "redis",
            "evolution",
            "chatwoot",
            "directus",
            "minio",
            "rabbitmq",
            "stirlingpdf",
            "prometheus",
            "grafana",
            "dozzle",
        ],
    },
    InstallationProfile {
        name: "monitoring",
        description: "Metrics, dashboards and logs",
        stacks: &["prometheus", "grafana", "dozzle"],
    },
];

// =============================================================================
// CATALOG
// =============================================================================

/// Read-only registry of stack descriptors and installation profiles.
#[derive(Debug, Clone)]
pub struct Catalog {
    stacks: BTreeMap<&'static str, StackDescriptor>,
    profiles: &'static [InstallationProfile],
}

impl Catalog {
    /// The built-in catalog.
    ///
    /// The built-in table has unique ids, so this cannot fail; the test suite
    /// also runs `validate()` over it.
    #[must_use]
    pub fn builtin() -> Self {
        let stacks = BUILTIN_STACKS.iter().map(|d| (d.id, d.clone())).collect();
        Self {
            stacks,
            profiles: BUILTIN_PROFILES,
        }
    }

    /// Build a catalog from an arbitrary descriptor table, without profiles.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = StackDescriptor>,
    ) -> Result<Self, StackforgeError> {
        let mut stacks = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.id;
            if stacks.insert(id, descriptor).is_some() {
                return Err(StackforgeError::DuplicateStack(id.to_string()));
            }
        }
        Ok(Self {
            stacks,
            profiles: &[],
        })
    }

    /// Look up a descriptor by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StackDescriptor> {
        self.stacks.get(id)
    }

    /// Look up a descriptor by id, failing with `UnknownStack`.
    pub fn require(&self, id: &str) -> Result<&StackDescriptor, StackforgeError> {
        self.get(id)
            .ok_or_else(|| StackforgeError::UnknownStack(id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.stacks.contains_key(id)
    }

    /// All descriptors, ordered by id.
    pub fn descriptors(&self) -> impl Iterator<Item = &StackDescriptor> {
        self.stacks.values()
    }

    /// All descriptors of one category, ordered by id.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &StackDescriptor> {
        self.stacks.values().filter(move |d| d.category == category)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn profiles(&self) -> &'static [InstallationProfile] {
        self.profiles
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&'static InstallationProfile, StackforgeError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StackforgeError::UnknownProfile(name.to_string()))
    }

    /// Check the whole dependency graph: every referenced id exists and no
    /// stack transitively depends on itself.
    pub fn validate(&self) -> Result<(), StackforgeError> {
        for descriptor in self.stacks.values() {
            for dependency in descriptor.dependencies {
                if !self.stacks.contains_key(dependency) {
                    return Err(StackforgeError::UnknownDependency {
                        stack: descriptor.id.to_string(),
                        dependency: (*dependency).to_string(),
                    });
                }
            }
        }
        resolver::resolve(self, self.stacks.keys().copied()).map(|_| ())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// TESTS
// =============================================================================
