//! Manifest variants, grouped by catalog category.

mod application;
mod database;
mod infrastructure;
mod monitoring;

use super::StackTemplate;

/// Every variant, looked up by `StackTemplate::name`.
pub(super) static TEMPLATES: &[&dyn StackTemplate] = &[
    &infrastructure::Traefik,
    &infrastructure::Portainer,
    &database::Postgres,
    &database::Redis,
    &database::PgVector,
    &database::PgBouncer,
    &database::Minio,
    &database::RabbitMq,
    &application::Evolution,
    &application::Chatwoot,
    &application::Directus,
    &application::StirlingPdf,
    &monitoring::Prometheus,
    &monitoring::Grafana,
    &monitoring::Dozzle,
];

/// One-entry service map.
fn single(
    name: &str,
    service: super::Service,
) -> std::collections::BTreeMap<String, super::Service> {
    std::collections::BTreeMap::from([(name.to_string(), service)])
}
