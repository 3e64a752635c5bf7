//! # Planning Scenarios
//!
//! End-to-end checks of the planner: profile to order to manifests.

#![allow(clippy::unwrap_used, clippy::panic)]

use stackforge_core::{
    ACME_EMAIL_KEY, Catalog, Category, DeploymentConfig, PrefixMap, SECRET_POLICY,
    StackDescriptor, StackforgeError, generate, implemented, install_order, resolve,
};

fn seeded_config() -> DeploymentConfig {
    let mut config = DeploymentConfig::new();
    config.insert(ACME_EMAIL_KEY, "ops@example.com");
    for (_, specs) in SECRET_POLICY {
        for spec in specs.iter() {
            config.insert(spec.key, format!("{}-secret", spec.key));
        }
    }
    config
}

#[test]
fn messaging_api_pulls_in_its_databases() {
    let catalog = Catalog::builtin();
    assert_eq!(
        resolve(&catalog, ["evolution"]).expect("resolve"),
        vec!["postgres", "redis", "evolution"]
    );
}

#[test]
fn mutual_dependency_is_fatal() {
    let catalog = Catalog::from_descriptors([
        StackDescriptor::new("a", Category::Application, "a").depends_on(&["b"]),
        StackDescriptor::new("b", Category::Application, "b").depends_on(&["a"]),
    ])
    .expect("catalog");

    let err = resolve(&catalog, ["a"]).expect_err("cycle");
    assert_eq!(
        err,
        StackforgeError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()]
        }
    );
    assert!(catalog.validate().is_err());
}

#[test]
fn full_profile_plans_and_renders() {
    let catalog = Catalog::builtin();
    let profile = catalog.profile("full").expect("profile");
    let order = install_order(&catalog, profile.stacks).expect("order");

    assert_eq!(&order[..2], &["portainer", "traefik"]);
    assert_eq!(order.len(), profile.stacks.len());

    let prefixes = PrefixMap::from_catalog(&catalog);
    let config = seeded_config();
    for id in &order {
        let descriptor = catalog.require(id).expect("descriptor");
        let manifest = generate(descriptor, "example.com", &prefixes, &config)
            .unwrap_or_else(|e| panic!("{} failed: {}", id, e));
        assert!(
            manifest.text.contains("version: '3.8'")
                || manifest.text.contains("version: \"3.8\"")
        );
        assert!(manifest.text.contains("external: true"));
    }
}

#[test]
fn identical_inputs_give_identical_manifests() {
    let catalog = Catalog::builtin();
    let prefixes = PrefixMap::from_catalog(&catalog);
    let config = seeded_config();

    for id in implemented() {
        let descriptor = catalog.require(id).expect("descriptor");
        let first = generate(descriptor, "example.com", &prefixes, &config).expect("first");
        let second = generate(descriptor, "example.com", &prefixes, &config).expect("second");
        assert_eq!(first.text, second.text, "{} is not deterministic", id);
        assert_eq!(first.config_sources, second.config_sources);
    }
}

#[test]
fn prefix_override_changes_only_the_host() {
    let catalog = Catalog::builtin();
    let config = seeded_config();
    let descriptor = catalog.require("grafana").expect("grafana");

    let defaults = PrefixMap::from_catalog(&catalog);
    let mut custom = defaults.clone();
    custom.set("grafana", "dashboards");

    let a = generate(descriptor, "example.com", &defaults, &config).expect("a");
    let b = generate(descriptor, "example.com", &custom, &config).expect("b");
    assert!(a.text.contains("grafana.example.com"));
    assert!(b.text.contains("dashboards.example.com"));
    assert!(!b.text.contains("grafana.example.com"));
}

#[test]
fn manifests_never_invent_secrets() {
    let catalog = Catalog::builtin();
    let prefixes = PrefixMap::from_catalog(&catalog);
    let mut config = DeploymentConfig::new();
    config.insert(ACME_EMAIL_KEY, "ops@example.com");

    let descriptor = catalog.require("grafana").expect("grafana");
    assert_eq!(
        generate(descriptor, "example.com", &prefixes, &config),
        Err(StackforgeError::MissingSecret {
            stack: "grafana".into(),
            key: "grafana_password".into(),
        })
    );
}

#[test]
fn stacks_without_variant_are_catalogued() {
    let catalog = Catalog::builtin();
    let implemented: Vec<&str> = implemented().collect();
    let missing: Vec<&str> = catalog
        .descriptors()
        .map(|d| d.id)
        .filter(|id| !implemented.contains(id))
        .collect();
    assert_eq!(missing, vec!["n8n", "typebot"]);
}
