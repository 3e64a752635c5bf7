//! # Compose Model
//!
//! Typed subset of the swarm compose format, just large enough for the
//! built-in stacks. Maps are `BTreeMap` and label lists keep insertion
//! order, so rendering the same model twice yields byte-identical text.

use crate::primitives::{
    CERT_RESOLVER, COMPOSE_VERSION, MANAGER_CONSTRAINT, PUBLIC_NETWORK, SECURE_ENTRYPOINT,
};
use crate::types::StackforgeError;
use serde::Serialize;
use std::collections::BTreeMap;

// =============================================================================
// FILE
// =============================================================================

/// Root of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeFile {
    pub version: &'static str,
    pub services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, ExternalRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, ExternalRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub configs: BTreeMap<String, ExternalRef>,
}

impl ComposeFile {
    #[must_use]
    pub fn new(services: BTreeMap<String, Service>) -> Self {
        Self {
            version: COMPOSE_VERSION,
            services,
            volumes: BTreeMap::new(),
            networks: BTreeMap::new(),
            configs: BTreeMap::new(),
        }
    }

    /// Render to YAML text.
    pub fn to_yaml(&self) -> Result<String, StackforgeError> {
        serde_yaml::to_string(self).map_err(|e| StackforgeError::Serialization(e.to_string()))
    }
}

/// Top-level declaration of an object created outside the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternalRef {
    pub external: bool,
}

impl ExternalRef {
    pub const EXTERNAL: Self = Self { external: true };
}

// =============================================================================
// SERVICE
// =============================================================================

/// One container service of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigMount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    pub deploy: Deploy,
}

/// Container command, either one shell-style line or an argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Command {
    Line(String),
    Args(Vec<String>),
}

/// Port published in host mode (bypassing the routing mesh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub target: u16,
    pub published: u16,
    pub mode: &'static str,
    pub protocol: &'static str,
}

/// Named config mounted as a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigMount {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deploy {
    pub mode: DeployMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    Replicated,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub constraints: Vec<String>,
}

/// A reverse-proxy routing rule: `Host(host)` goes to `port` of the service
/// carrying the labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub router: String,
    pub host: String,
    pub port: u16,
    /// Proxy-internal service to target instead of the container port.
    pub internal_service: Option<&'static str>,
}

impl Route {
    #[must_use]
    pub fn new(router: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            router: router.into(),
            host: host.into(),
            port,
            internal_service: None,
        }
    }

    #[must_use]
    pub fn to_internal(mut self, service: &'static str) -> Self {
        self.internal_service = Some(service);
        self
    }
}

impl Service {
    /// A single-replica replicated service.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: None,
            environment: BTreeMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            configs: Vec::new(),
            networks: Vec::new(),
            deploy: Deploy {
                mode: DeployMode::Replicated,
                replicas: Some(1),
                placement: None,
                labels: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn command(mut self, line: impl Into<String>) -> Self {
        self.command = Some(Command::Line(line.into()));
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(Command::Args(args.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn volume(mut self, mount: impl Into<String>) -> Self {
        self.volumes.push(mount.into());
        self
    }

    #[must_use]
    pub fn network(mut self, name: impl Into<String>) -> Self {
        self.networks.push(name.into());
        self
    }

    #[must_use]
    pub fn config(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.configs.push(ConfigMount {
            source: source.into(),
            target: target.into(),
        });
        self
    }

    /// Publish `target` on the node's own `published` port.
    #[must_use]
    pub fn host_port(mut self, target: u16, published: u16) -> Self {
        self.ports.push(PortBinding {
            target,
            published,
            mode: "host",
            protocol: "tcp",
        });
        self
    }

    /// One task per node instead of a replica count.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.deploy.mode = DeployMode::Global;
        self.deploy.replicas = None;
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.deploy
            .placement
            .get_or_insert_with(|| Placement {
                constraints: Vec::new(),
            })
            .constraints
            .push(constraint.into());
        self
    }

    /// Pin to the manager role.
    #[must_use]
    pub fn on_manager(self) -> Self {
        self.constraint(MANAGER_CONSTRAINT)
    }

    /// Add reverse-proxy labels for `route`. The enable and network labels
    /// are emitted once no matter how many routes a service carries.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        let labels = self.proxy_labels();
        let r = &route.router;
        let service = route.internal_service.unwrap_or(r.as_str());
        labels.push(format!("traefik.http.routers.{r}.rule=Host(`{}`)", route.host));
        labels.push(format!("traefik.http.routers.{r}.entrypoints={SECURE_ENTRYPOINT}"));
        labels.push(format!("traefik.http.routers.{r}.tls.certresolver={CERT_RESOLVER}"));
        labels.push(format!("traefik.http.routers.{r}.service={service}"));
        labels.push(format!(
            "traefik.http.services.{r}.loadbalancer.server.port={}",
            route.port
        ));
        self
    }

    /// Forward raw TCP from the proxy `entrypoint` to `port`. Plain TCP
    /// carries no SNI, so the router takes every connection on that
    /// entrypoint.
    #[must_use]
    pub fn tcp_route(mut self, router: &str, entrypoint: &str, port: u16) -> Self {
        let labels = self.proxy_labels();
        labels.push(format!("traefik.tcp.routers.{router}.rule=HostSNI(`*`)"));
        labels.push(format!("traefik.tcp.routers.{router}.entrypoints={entrypoint}"));
        labels.push(format!("traefik.tcp.routers.{router}.service={router}"));
        labels.push(format!("traefik.tcp.services.{router}.loadbalancer.server.port={port}"));
        self
    }

    fn proxy_labels(&mut self) -> &mut Vec<String> {
        let labels = &mut self.deploy.labels;
        if labels.is_empty() {
            labels.push("traefik.enable=true".to_string());
            labels.push(format!("traefik.docker.network={}", PUBLIC_NETWORK));
        }
        labels
    }

    /// Named volumes mounted by this service (host bind mounts excluded).
    pub fn named_volumes(&self) -> impl Iterator<Item = &str> {
        self.volumes
            .iter()
            .filter_map(|m| m.split(':').next())
            .filter(|source| !source.starts_with('/') && !source.starts_with('.'))
    }
}

// =============================================================================
// TESTS
// =============================================================================
