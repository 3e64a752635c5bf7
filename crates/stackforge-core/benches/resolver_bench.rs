//! # Planner Benchmarks
//!
//! Performance benchmarks for dependency resolution and manifest rendering.
//!
//! Run with: `cargo bench -p stackforge-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use stackforge_core::{
    ACME_EMAIL_KEY, Catalog, Category, DeploymentConfig, PrefixMap, SECRET_POLICY,
    StackDescriptor, generate, resolve,
};
use std::hint::black_box;

/// Catalog where stack `i` depends on every stack below it.
fn dense_catalog(size: usize) -> (Catalog, &'static str) {
    let ids: Vec<&'static str> = (0..size)
        .map(|i| &*Box::leak(format!("s{i}").into_boxed_str()))
        .collect();
    let descriptors: Vec<StackDescriptor> = (0..size)
        .map(|i| {
            let deps: &'static [&'static str] = Box::leak(ids[..i].to_vec().into_boxed_slice());
            StackDescriptor::new(ids[i], Category::Application, "bench").depends_on(deps)
        })
        .collect();
    (
        Catalog::from_descriptors(descriptors).expect("catalog"),
        ids[size - 1],
    )
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_resolve_builtin(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let profile = catalog.profile("full").expect("profile");

    c.bench_function("resolve_full_profile", |b| {
        b.iter(|| black_box(resolve(&catalog, black_box(profile.stacks))))
    });
}

fn bench_resolve_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_dense");

    for size in [10usize, 50, 200] {
        let (catalog, top) = dense_catalog(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &top, |b, top| {
            b.iter(|| black_box(resolve(&catalog, [*top])))
        });
    }

    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let prefixes = PrefixMap::from_catalog(&catalog);
    let mut config = DeploymentConfig::new();
    config.insert(ACME_EMAIL_KEY, "ops@example.com");
    for (_, specs) in SECRET_POLICY {
        for spec in specs.iter() {
            config.insert(spec.key, "bench-secret");
        }
    }
    let descriptor = catalog.require("chatwoot").expect("chatwoot");

    c.bench_function("generate_chatwoot", |b| {
        b.iter(|| black_box(generate(descriptor, "example.com", &prefixes, &config)))
    });
}

criterion_group!(benches, bench_resolve_builtin, bench_resolve_dense, bench_generate);
criterion_main!(benches);
