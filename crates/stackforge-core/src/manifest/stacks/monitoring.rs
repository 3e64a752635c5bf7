use super::single;
use crate::manifest::{ConfigSource, ManifestContext, Route, Service, StackTemplate};
use crate::primitives::{INTERNAL_NETWORK, PUBLIC_NETWORK};
use crate::types::StackforgeError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type Services = Result<BTreeMap<String, Service>, StackforgeError>;

// =============================================================================
// PROMETHEUS
// =============================================================================

/// Scrape config: the server itself plus every task of the two exporters,
/// discovered through swarm's `tasks.<service>` DNS names.
const PROMETHEUS_SCRAPE_CONFIG: &str = "\
global:
  scrape_interval: 15s
  evaluation_interval: 15s
scrape_configs:
  - job_name: prometheus
    static_configs:
      - targets: ['localhost:9090']
  - job_name: node-exporter
    dns_sd_configs:
      - names: ['tasks.node-exporter']
        type: A
        port: 9100
  - job_name: cadvisor
    dns_sd_configs:
      - names: ['tasks.cadvisor']
        type: A
        port: 8080
";

pub struct Prometheus;

impl StackTemplate for Prometheus {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let host = ctx.own_host();
        let prometheus = Service::new("prom/prometheus:latest")
            .args([
                "--config.file=/etc/prometheus/prometheus.yml".to_string(),
                "--storage.tsdb.path=/prometheus".to_string(),
                format!("--web.external-url=https://{host}"),
                "--web.route-prefix=/".to_string(),
            ])
            .volume("prometheus_data:/prometheus")
            .config("config_prometheus", "/etc/prometheus/prometheus.yml")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .on_manager()
            .route(Route::new("prometheus", host, 9090));

        let node_exporter = Service::new("prom/node-exporter:latest")
            .args([
                "--path.procfs=/host/proc",
                "--path.sysfs=/host/sys",
                "--collector.filesystem.mount-points-exclude=^/(sys|proc|dev|host|etc)($$|/)",
            ])
            .volume("/proc:/host/proc:ro")
            .volume("/sys:/host/sys:ro")
            .volume("/:/rootfs:ro")
            .network(INTERNAL_NETWORK)
            .global();

        let cadvisor = Service::new("gcr.io/cadvisor/cadvisor:latest")
            .volume("/:/rootfs:ro")
            .volume("/var/run:/var/run:ro")
            .volume("/sys:/sys:ro")
            .volume("/var/lib/docker/:/var/lib/docker:ro")
            .volume("/dev/disk/:/dev/disk:ro")
            .network(INTERNAL_NETWORK)
            .global();

        Ok(BTreeMap::from([
            ("prometheus".to_string(), prometheus),
            ("node-exporter".to_string(), node_exporter),
            ("cadvisor".to_string(), cadvisor),
        ]))
    }

    fn config_sources(
        &self,
        _ctx: &ManifestContext<'_>,
    ) -> Result<Vec<ConfigSource>, StackforgeError> {
        Ok(vec![ConfigSource {
            name: "config_prometheus",
            file_name: "prometheus.yml",
            content: PROMETHEUS_SCRAPE_CONFIG.to_string(),
        }])
    }
}

// =============================================================================
// GRAFANA
// =============================================================================

pub struct Grafana;

impl StackTemplate for Grafana {
    fn name(&self) -> &'static str {
        "grafana"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let host = ctx.own_host();
        let service = Service::new("grafana/grafana:latest")
            .env("GF_SECURITY_ADMIN_USER", "admin")
            .env("GF_SECURITY_ADMIN_PASSWORD", ctx.secret("grafana_password")?)
            .env("GF_SERVER_ROOT_URL", format!("https://{host}"))
            .env("GF_SERVER_DOMAIN", host.clone())
            .env("GF_USERS_ALLOW_SIGN_UP", "false")
            .volume("grafana_data:/var/lib/grafana")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .on_manager()
            .route(Route::new("grafana", host, 3000));
        Ok(single("grafana", service))
    }
}

// =============================================================================
// DOZZLE
// =============================================================================

pub struct Dozzle;

const DOZZLE_USERS_PATH: &str = "/data/users.yml";

impl StackTemplate for Dozzle {
    fn name(&self) -> &'static str {
        "dozzle"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let service = Service::new("amir20/dozzle:latest")
            .env("DOZZLE_AUTH_PROVIDER", "simple")
            .env("DOZZLE_KEY", ctx.secret("dozzle_key")?)
            .volume("/var/run/docker.sock:/var/run/docker.sock:ro")
            .config("config_dozzle", DOZZLE_USERS_PATH)
            .network(PUBLIC_NETWORK)
            .on_manager()
            .route(Route::new("dozzle", ctx.own_host(), 8080));
        Ok(single("dozzle", service))
    }

    /// Users file of the simple auth provider. Only the SHA-256 digest of
    /// the password leaves the deployment config.
    fn config_sources(
        &self,
        ctx: &ManifestContext<'_>,
    ) -> Result<Vec<ConfigSource>, StackforgeError> {
        let password = ctx.secret("dozzle_password")?;
        let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
        let content = format!(
            "users:\n  admin:\n    name: Admin\n    email: admin@{}\n    password: {}\n",
            ctx.base_domain, digest
        );
        Ok(vec![ConfigSource {
            name: "config_dozzle",
            file_name: "users.yml",
            content,
        }])
    }
}
