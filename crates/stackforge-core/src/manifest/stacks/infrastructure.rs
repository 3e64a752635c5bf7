use super::single;
use crate::manifest::{ManifestContext, Route, Service, StackTemplate};
use crate::primitives::{
    AGENT_NETWORK, CERT_RESOLVER, POOLER_ENTRYPOINT, POOLER_PORT, PUBLIC_NETWORK,
    SECURE_ENTRYPOINT,
};
use crate::secrets::{ACME_EMAIL_KEY, DNS_API_TOKEN_KEY};
use crate::types::StackforgeError;
use std::collections::BTreeMap;

pub struct Traefik;

impl StackTemplate for Traefik {
    fn name(&self) -> &'static str {
        "traefik"
    }

    fn services(
        &self,
        ctx: &ManifestContext<'_>,
    ) -> Result<BTreeMap<String, Service>, StackforgeError> {
        let email = ctx.setting(ACME_EMAIL_KEY)?;
        let acme = format!("--certificatesresolvers.{CERT_RESOLVER}.acme");

        let mut args = vec![
            "--providers.docker=true".to_string(),
            "--providers.docker.swarmMode=true".to_string(),
            "--providers.docker.exposedbydefault=false".to_string(),
            format!("--providers.docker.network={PUBLIC_NETWORK}"),
            "--providers.docker.endpoint=unix:///var/run/docker.sock".to_string(),
            "--entrypoints.web.address=:80".to_string(),
            format!("--entrypoints.web.http.redirections.entryPoint.to={SECURE_ENTRYPOINT}"),
            "--entrypoints.web.http.redirections.entryPoint.scheme=https".to_string(),
            format!("--entrypoints.{SECURE_ENTRYPOINT}.address=:443"),
            format!("--entrypoints.{POOLER_ENTRYPOINT}.address=:{POOLER_PORT}"),
            "--api.dashboard=true".to_string(),
            format!("{acme}.email={email}"),
            format!("{acme}.storage=/letsencrypt/acme.json"),
            "--log.level=INFO".to_string(),
        ];

        let mut service = Service::new("traefik:v2.11");
        match ctx.optional(DNS_API_TOKEN_KEY) {
            Some(token) => {
                args.push(format!("{acme}.dnschallenge=true"));
                args.push(format!("{acme}.dnschallenge.provider=cloudflare"));
                service = service.env("CF_DNS_API_TOKEN", token);
            }
            None => args.push(format!("{acme}.httpchallenge.entrypoint=web")),
        }

        let service = service
            .args(args)
            .host_port(80, 80)
            .host_port(443, 443)
            .host_port(POOLER_PORT, POOLER_PORT)
            .volume("traefik_certificates:/letsencrypt")
            .volume("/var/run/docker.sock:/var/run/docker.sock:ro")
            .network(PUBLIC_NETWORK)
            .on_manager()
            .route(Route::new("traefik", ctx.own_host(), 8080).to_internal("api@internal"));

        Ok(single("traefik", service))
    }
}

pub struct Portainer;

const PORTAINER_VERSION: &str = "2.21.2";

impl StackTemplate for Portainer {
    fn name(&self) -> &'static str {
        "portainer"
    }

    fn services(
        &self,
        ctx: &ManifestContext<'_>,
    ) -> Result<BTreeMap<String, Service>, StackforgeError> {
        let agent = Service::new(format!("portainer/agent:{PORTAINER_VERSION}"))
            .volume("/var/run/docker.sock:/var/run/docker.sock")
            .volume("/var/lib/docker/volumes:/var/lib/docker/volumes")
            .network(AGENT_NETWORK)
            .global()
            .constraint("node.platform.os == linux");

        let portainer = Service::new(format!("portainer/portainer-ce:{PORTAINER_VERSION}"))
            .command("-H tcp://tasks.agent:9001 --tlsskipverify")
            .volume("portainer_data:/data")
            .network(AGENT_NETWORK)
            .network(PUBLIC_NETWORK)
            .on_manager()
            .route(Route::new("portainer", ctx.own_host(), 9000));

        Ok(BTreeMap::from([
            ("agent".to_string(), agent),
            ("portainer".to_string(), portainer),
        ]))
    }
}
