//! Integration tests for the readiness polling loop.
//!
//! Time is paused, so timeouts elapse instantly.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use stackforge::{Cluster, DeployError, MemoryCluster, ReadinessChecker, ServiceReplicas};
use stackforge_core::ResourceKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(1);

fn replicas(lines: &[&str]) -> Vec<ServiceReplicas> {
    lines
        .iter()
        .map(|l| ServiceReplicas::parse_line(l).unwrap())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_matching_replicas_are_ready() {
    let cluster = Arc::new(MemoryCluster::new());
    cluster.script("app", vec![replicas(&["app_web 1/1", "app_worker 2/2"])]);
    let checker = ReadinessChecker::new(cluster, INTERVAL);

    assert!(checker.await_ready("app", Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_replicas_time_out() {
    let cluster = Arc::new(MemoryCluster::new());
    cluster.script("app", vec![replicas(&["app_web 0/1"])]);
    let checker = ReadinessChecker::new(cluster, INTERVAL);

    let start = Instant::now();
    assert!(!checker.await_ready("app", Duration::from_secs(10)).await);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(9), "gave up after {:?}", elapsed);
    assert!(elapsed <= Duration::from_secs(11), "overran: {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_converging_stack_becomes_ready() {
    let cluster = Arc::new(MemoryCluster::new());
    cluster.script(
        "app",
        vec![
            replicas(&["app_web 0/1"]),
            replicas(&["app_web 0/1"]),
            replicas(&["app_web 1/1"]),
        ],
    );
    let checker = ReadinessChecker::new(cluster, INTERVAL);

    let start = Instant::now();
    assert!(checker.await_ready("app", Duration::from_secs(30)).await);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_no_services_is_never_ready() {
    let checker = ReadinessChecker::new(Arc::new(MemoryCluster::new()), INTERVAL);
    assert!(!checker.await_ready("missing", Duration::from_secs(3)).await);
}

// =============================================================================
// TRANSIENT FAILURES
// =============================================================================

/// Fails the first `failures` service queries, then reports one converged
/// service.
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Cluster for Flaky {
    async fn list(&self, _kind: ResourceKind) -> Result<Vec<String>, DeployError> {
        Ok(Vec::new())
    }

    async fn create_network(&self, _name: &str) -> Result<(), DeployError> {
        Ok(())
    }

    async fn create_volume(&self, _name: &str) -> Result<(), DeployError> {
        Ok(())
    }

    async fn create_config(&self, _name: &str, _source: &Path) -> Result<(), DeployError> {
        Ok(())
    }

    async fn deploy_stack(&self, _name: &str, _manifest: &Path) -> Result<(), DeployError> {
        Ok(())
    }

    async fn list_stacks(&self) -> Result<Vec<String>, DeployError> {
        Ok(Vec::new())
    }

    async fn stack_services(&self, stack: &str) -> Result<Vec<ServiceReplicas>, DeployError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DeployError::Command {
                command: "docker stack services".into(),
                detail: "exit status 1".into(),
            });
        }
        Ok(vec![ServiceReplicas::new(format!("{stack}_web"), 1, 1)])
    }

    async fn remove_stack(&self, _stack: &str) -> Result<(), DeployError> {
        Ok(())
    }

    async fn service_logs(&self, _service: &str, _tail: usize) -> Result<String, DeployError> {
        Ok(String::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_query_failures_are_retried() {
    let cluster = Arc::new(Flaky {
        failures: 3,
        calls: AtomicUsize::new(0),
    });
    let checker = ReadinessChecker::new(cluster.clone(), INTERVAL);

    assert!(checker.await_ready("app", Duration::from_secs(10)).await);
    assert_eq!(cluster.calls.load(Ordering::SeqCst), 4);
}
