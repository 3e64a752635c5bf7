//! # Dependency Resolver
//!
//! Expands a requested set of stack ids into a deduplicated,
//! dependency-first installation order.
//!
//! The walk is a post-order depth-first traversal driven by an explicit
//! worklist. Each call owns its marker sets:
//! - `resolved`: stacks already appended to the output (shared across all
//!   roots of the call, so a later branch never re-schedules them)
//! - `in_progress`: stacks on the current path; meeting one again is a cycle
//!
//! The output is canonical: the transitive closure is walked again in id
//! order, so the result depends only on the closure of the request and
//! `resolve(resolve(S))` returns the same ordering as `resolve(S)`.

use crate::catalog::Catalog;
use crate::types::{Category, StackDescriptor, StackforgeError};
use std::collections::{BTreeMap, BTreeSet};

/// One entry of the worklist: a stack and the index of the next dependency
/// to visit.
struct Frame<'c> {
    descriptor: &'c StackDescriptor,
    next: usize,
}

/// Resolve `requested` into a dependency-first order.
///
/// Every requested id and all of its transitive dependencies appear exactly
/// once, and every dependency of a stack appears at a strictly earlier
/// position.
///
/// # Errors
///
/// - `UnknownStack` if a requested id is not in the catalog
/// - `UnknownDependency` if a descriptor references a missing id
/// - `DependencyCycle` if a stack transitively depends on itself
pub fn resolve<I, S>(catalog: &Catalog, requested: I) -> Result<Vec<&'static str>, StackforgeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let first_pass = post_order(catalog, requested)?;
    let closure: BTreeSet<&'static str> = first_pass.into_iter().collect();
    post_order(catalog, closure)
}

/// `resolve`, then move dependency-free infrastructure stacks (proxy,
/// management UI) to the front, keeping relative order otherwise.
///
/// Moving a stack without dependencies earlier never breaks the
/// dependency-first property.
pub fn install_order<I, S>(
    catalog: &Catalog,
    requested: I,
) -> Result<Vec<&'static str>, StackforgeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order = resolve(catalog, requested)?;
    order.sort_by_key(|id| {
        let early = catalog
            .get(id)
            .is_some_and(|d| d.category == Category::Infrastructure && d.dependencies.is_empty());
        !early
    });
    Ok(order)
}

/// Group an already-resolved order into waves: every stack of a wave only
/// depends on stacks of earlier waves, so stacks inside one wave may be
/// deployed concurrently.
#[must_use]
pub fn deployment_waves(catalog: &Catalog, order: &[&'static str]) -> Vec<Vec<&'static str>> {
    let mut level: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut waves: Vec<Vec<&'static str>> = Vec::new();

    for &id in order {
        let wave = catalog
            .get(id)
            .map(|d| {
                d.dependencies
                    .iter()
                    .filter_map(|dep| level.get(dep))
                    .map(|l| l + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        level.insert(id, wave);
        if waves.len() <= wave {
            waves.resize_with(wave + 1, Vec::new);
        }
        waves[wave].push(id);
    }

    waves
}

/// Post-order walk from each root in iteration order.
fn post_order<I, S>(catalog: &Catalog, roots: I) -> Result<Vec<&'static str>, StackforgeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order: Vec<&'static str> = Vec::new();
    let mut resolved: BTreeSet<&'static str> = BTreeSet::new();

    for root in roots {
        let root = catalog.require(root.as_ref())?;
        if resolved.contains(root.id) {
            continue;
        }

        let mut in_progress: BTreeSet<&'static str> = BTreeSet::from([root.id]);
        let mut worklist: Vec<Frame<'_>> = vec![Frame {
            descriptor: root,
            next: 0,
        }];

        while let Some(frame) = worklist.last_mut() {
            let current = frame.descriptor.id;
            let next_dependency = frame.descriptor.dependencies.get(frame.next).copied();

            let Some(dependency) = next_dependency else {
                // All dependencies appended: the stack itself can go.
                worklist.pop();
                in_progress.remove(current);
                resolved.insert(current);
                order.push(current);
                continue;
            };
            frame.next += 1;

            if resolved.contains(dependency) {
                continue;
            }

            let descriptor =
                catalog
                    .get(dependency)
                    .ok_or_else(|| StackforgeError::UnknownDependency {
                        stack: current.to_string(),
                        dependency: dependency.to_string(),
                    })?;

            if in_progress.contains(descriptor.id) {
                return Err(cycle_error(&worklist, descriptor.id));
            }

            in_progress.insert(descriptor.id);
            worklist.push(Frame {
                descriptor,
                next: 0,
            });
        }
    }

    Ok(order)
}

/// Build the cycle path from the first occurrence of `reentered` on the
/// worklist back to itself.
fn cycle_error(worklist: &[Frame<'_>], reentered: &str) -> StackforgeError {
    let start = worklist
        .iter()
        .position(|f| f.descriptor.id == reentered)
        .unwrap_or(0);
    let mut cycle: Vec<String> = worklist[start..]
        .iter()
        .map(|f| f.descriptor.id.to_string())
        .collect();
    cycle.push(reentered.to_string());
    StackforgeError::DependencyCycle { cycle }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(id: &'static str, deps: &'static [&'static str]) -> StackDescriptor {
        StackDescriptor::new(id, Category::Application, id).depends_on(deps)
    }

    #[test]
    fn leaf_resolves_to_itself() {
        let catalog = Catalog::builtin();
        assert_eq!(resolve(&catalog, ["redis"]), Ok(vec!["redis"]));
    }

    #[test]
    fn dependencies_come_first() {
        let catalog = Catalog::builtin();
        let order = resolve(&catalog, ["evolution"]).expect("resolve");
        assert_eq!(order, vec!["postgres", "redis", "evolution"]);
    }

    #[test]
    fn shared_dependency_scheduled_once() {
        let catalog = Catalog::builtin();
        let order = resolve(&catalog, ["chatwoot", "evolution", "pgbouncer"]).expect("resolve");
        assert_eq!(order.iter().filter(|id| **id == "postgres").count(), 1);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn request_order_does_not_change_output() {
        let catalog = Catalog::builtin();
        let a = resolve(&catalog, ["grafana", "evolution", "minio"]).expect("a");
        let b = resolve(&catalog, ["minio", "grafana", "evolution"]).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_request_is_rejected() {
        let catalog = Catalog::builtin();
        assert_eq!(
            resolve(&catalog, ["wordpress"]),
            Err(StackforgeError::UnknownStack("wordpress".into()))
        );
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let catalog = Catalog::from_descriptors([stack("app", &["db"]), stack("db", &["disk"])])
            .expect("catalog");
        assert_eq!(
            resolve(&catalog, ["app"]),
            Err(StackforgeError::UnknownDependency {
                stack: "db".into(),
                dependency: "disk".into(),
            })
        );
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let catalog = Catalog::from_descriptors([stack("a", &["b"]), stack("b", &["a"])])
            .expect("catalog");
        assert_eq!(
            resolve(&catalog, ["a"]),
            Err(StackforgeError::DependencyCycle {
                cycle: vec!["a".into(), "b".into(), "a".into()],
            })
        );
    }

    #[test]
    fn cycle_path_excludes_the_entry_chain() {
        let catalog = Catalog::from_descriptors([
            stack("app", &["x"]),
            stack("x", &["y"]),
            stack("y", &["z"]),
            stack("z", &["x"]),
        ])
        .expect("catalog");
        assert_eq!(
            resolve(&catalog, ["app"]),
            Err(StackforgeError::DependencyCycle {
                cycle: vec!["x".into(), "y".into(), "z".into(), "x".into()],
            })
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let catalog = Catalog::from_descriptors([stack("loop", &["loop"])]).expect("catalog");
        assert!(matches!(
            resolve(&catalog, ["loop"]),
            Err(StackforgeError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let catalog = Catalog::from_descriptors([
            stack("top", &["left", "right"]),
            stack("left", &["base"]),
            stack("right", &["base"]),
            stack("base", &[]),
        ])
        .expect("catalog");
        assert_eq!(
            resolve(&catalog, ["top"]),
            Ok(vec!["base", "left", "right", "top"])
        );
    }

    #[test]
    fn install_order_puts_infrastructure_first() {
        let catalog = Catalog::builtin();
        let order = install_order(&catalog, ["grafana", "traefik", "portainer"]).expect("order");
        assert_eq!(order, vec!["portainer", "traefik", "prometheus", "grafana"]);
    }

    #[test]
    fn waves_group_independent_stacks() {
        let catalog = Catalog::builtin();
        let order = resolve(&catalog, ["evolution", "grafana"]).expect("resolve");
        let waves = deployment_waves(&catalog, &order);
        assert_eq!(waves.len(), 2);
        assert!(waves[0].contains(&"postgres"));
        assert!(waves[0].contains(&"prometheus"));
        assert!(waves[1].contains(&"evolution"));
        assert!(waves[1].contains(&"grafana"));
    }
}
