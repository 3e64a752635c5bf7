use super::single;
use crate::manifest::{ManifestContext, Route, Service, StackTemplate, console_key};
use crate::primitives::{INTERNAL_NETWORK, POOLER_ENTRYPOINT, POOLER_PORT, PUBLIC_NETWORK};
use crate::types::StackforgeError;
use std::collections::BTreeMap;

type Services = Result<BTreeMap<String, Service>, StackforgeError>;

// =============================================================================
// POSTGRES FAMILY
// =============================================================================

/// A postgres server plus a web console companion, the only routed service.
fn postgres_pair(
    ctx: &ManifestContext<'_>,
    image: &str,
    password: &str,
    database: &str,
) -> BTreeMap<String, Service> {
    let id = ctx.stack;
    let server = Service::new(image)
        .env("POSTGRES_USER", "postgres")
        .env("POSTGRES_PASSWORD", password)
        .env("POSTGRES_DB", database)
        .volume(format!("{id}_data:/var/lib/postgresql/data"))
        .network(INTERNAL_NETWORK)
        .on_manager();

    let console = Service::new("sosedoff/pgweb:latest")
        .env(
            "DATABASE_URL",
            format!("postgres://postgres:{password}@{id}:5432/{database}?sslmode=disable"),
        )
        .network(PUBLIC_NETWORK)
        .network(INTERNAL_NETWORK)
        .route(Route::new(id, ctx.own_host(), 8081));

    BTreeMap::from([(id.to_string(), server), (format!("{id}-admin"), console)])
}

pub struct Postgres;

impl StackTemplate for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let password = ctx.secret("postgres_password")?;
        Ok(postgres_pair(ctx, "postgres:16", password, "postgres"))
    }
}

pub struct PgVector;

impl StackTemplate for PgVector {
    fn name(&self) -> &'static str {
        "pgvector"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let password = ctx.secret("pgvector_password")?;
        Ok(postgres_pair(ctx, "pgvector/pgvector:pg15", password, "pgvector"))
    }
}

pub struct PgBouncer;

impl StackTemplate for PgBouncer {
    fn name(&self) -> &'static str {
        "pgbouncer"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let password = ctx.secret("postgres_password")?;
        let service = Service::new("edoburu/pgbouncer:latest")
            .env("DATABASES_HOST", "postgres")
            .env("DATABASES_PORT", "5432")
            .env("DATABASES_USER", "postgres")
            .env("DATABASES_PASSWORD", password)
            .env("DATABASES_DBNAME", "postgres")
            .env("POOL_MODE", "session")
            .env("MAX_CLIENT_CONN", "1000")
            .env("DEFAULT_POOL_SIZE", "25")
            .env("ADMIN_USERS", "postgres")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .on_manager()
            .tcp_route("pgbouncer", POOLER_ENTRYPOINT, POOLER_PORT);
        Ok(single("pgbouncer", service))
    }
}

// =============================================================================
// KEY/VALUE, OBJECTS, MESSAGING
// =============================================================================

pub struct Redis;

impl StackTemplate for Redis {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let password = ctx.secret("redis_password")?;
        let server = Service::new("redis:7-alpine")
            .command(format!("redis-server --requirepass {password} --appendonly yes"))
            .volume("redis_data:/data")
            .network(INTERNAL_NETWORK)
            .on_manager();

        let console = Service::new("rediscommander/redis-commander:latest")
            .env("REDIS_HOSTS", format!("local:redis:6379:0:{password}"))
            .env("PORT", "8081")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .route(Route::new("redis", ctx.own_host(), 8081));

        Ok(BTreeMap::from([
            ("redis".to_string(), server),
            ("redis-admin".to_string(), console),
        ]))
    }
}

pub struct Minio;

impl StackTemplate for Minio {
    fn name(&self) -> &'static str {
        "minio"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let api_host = ctx.own_host();
        let console_host = ctx.host(&console_key("minio"));
        let service = Service::new("minio/minio:latest")
            .command("server /data --console-address \":9001\"")
            .env("MINIO_ROOT_USER", ctx.secret("minio_root_user")?)
            .env("MINIO_ROOT_PASSWORD", ctx.secret("minio_root_password")?)
            .env("MINIO_BROWSER_REDIRECT_URL", format!("https://{console_host}"))
            .env("MINIO_SERVER_URL", format!("https://{api_host}"))
            .volume("minio_data:/data")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .on_manager()
            .route(Route::new("minio-api", api_host, 9000))
            .route(Route::new("minio-console", console_host, 9001));
        Ok(single("minio", service))
    }
}

pub struct RabbitMq;

impl StackTemplate for RabbitMq {
    fn name(&self) -> &'static str {
        "rabbitmq"
    }

    fn services(&self, ctx: &ManifestContext<'_>) -> Services {
        let service = Service::new("rabbitmq:3-management-alpine")
            .env("RABBITMQ_DEFAULT_USER", ctx.secret("rabbitmq_user")?)
            .env("RABBITMQ_DEFAULT_PASS", ctx.secret("rabbitmq_password")?)
            .env("RABBITMQ_DEFAULT_VHOST", "/")
            .volume("rabbitmq_data:/var/lib/rabbitmq")
            .network(PUBLIC_NETWORK)
            .network(INTERNAL_NETWORK)
            .on_manager()
            .route(Route::new("rabbitmq", ctx.own_host(), 15672));
        Ok(single("rabbitmq", service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PrefixMap;
    use crate::secrets::DeploymentConfig;

    fn ctx<'a>(
        stack: &'static str,
        prefixes: &'a PrefixMap,
        secrets: &'a DeploymentConfig,
    ) -> ManifestContext<'a> {
        ManifestContext {
            stack,
            base_domain: "example.com",
            prefixes,
            secrets,
        }
    }

    #[test]
    fn postgres_console_is_the_routed_service() {
        let prefixes = PrefixMap::new();
        let mut secrets = DeploymentConfig::new();
        secrets.insert("postgres_password", "pw");
        let services = Postgres.services(&ctx("postgres", &prefixes, &secrets)).expect("services");

        assert!(services["postgres"].deploy.labels.is_empty());
        let console = &services["postgres-admin"];
        assert!(console.deploy.labels.iter().any(|l| l.contains("Host(`postgres.example.com`)")));
        assert_eq!(
            console.environment.get("DATABASE_URL").map(String::as_str),
            Some("postgres://postgres:pw@postgres:5432/postgres?sslmode=disable")
        );
    }

    #[test]
    fn pgbouncer_is_forwarded_as_tcp() {
        let prefixes = PrefixMap::new();
        let mut secrets = DeploymentConfig::new();
        secrets.insert("postgres_password", "pw");
        let services = PgBouncer
            .services(&ctx("pgbouncer", &prefixes, &secrets))
            .expect("services");

        let labels = &services["pgbouncer"].deploy.labels;
        assert!(labels.iter().any(|l| l == "traefik.tcp.routers.pgbouncer.entrypoints=pgbouncer"));
        assert!(!labels.iter().any(|l| l.starts_with("traefik.http.")));
    }

    #[test]
    fn pgbouncer_reads_the_postgres_secret() {
        let prefixes = PrefixMap::new();
        let secrets = DeploymentConfig::new();
        assert_eq!(
            PgBouncer.services(&ctx("pgbouncer", &prefixes, &secrets)).err(),
            Some(StackforgeError::MissingSecret {
                stack: "pgbouncer".into(),
                key: "postgres_password".into(),
            })
        );
    }

    #[test]
    fn minio_routes_api_and_console() {
        let mut prefixes = PrefixMap::new();
        prefixes.set("minio_console", "console.minio");
        let mut secrets = DeploymentConfig::new();
        secrets.insert("minio_root_user", "minioadmin");
        secrets.insert("minio_root_password", "pw");
        let services = Minio.services(&ctx("minio", &prefixes, &secrets)).expect("services");

        let labels = &services["minio"].deploy.labels;
        assert!(labels.iter().any(|l| l.ends_with("Host(`minio.example.com`)")));
        assert!(labels.iter().any(|l| l.ends_with("Host(`console.minio.example.com`)")));
    }
}
