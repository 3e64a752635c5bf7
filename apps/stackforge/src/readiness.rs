//! # Readiness Checker
//!
//! Bounded polling loop: POLLING -> READY when every service of the stack
//! runs as many replicas as it wants (and at least one service exists),
//! POLLING -> TIMED_OUT otherwise. A failed query is just "not ready yet".

use crate::cluster::{Cluster, ServiceReplicas};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// At least one service, all converged.
pub fn all_ready(services: &[ServiceReplicas]) -> bool {
    !services.is_empty() && services.iter().all(ServiceReplicas::is_converged)
}

pub struct ReadinessChecker {
    cluster: Arc<dyn Cluster>,
    interval: Duration,
}

impl ReadinessChecker {
    pub fn new(cluster: Arc<dyn Cluster>, interval: Duration) -> Self {
        Self { cluster, interval }
    }

    pub async fn await_ready(&self, stack: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.cluster.stack_services(stack).await {
                Ok(services) if all_ready(&services) => {
                    info!(stack, services = services.len(), "Stack ready");
                    return true;
                }
                Ok(services) => {
                    debug!(stack, ?services, "Stack not converged yet");
                }
                Err(e) => {
                    debug!(stack, error = %e, "Service query failed, retrying");
                }
            }
            if Instant::now() + self.interval > deadline {
                warn!(stack, timeout_secs = timeout.as_secs(), "Stack not ready before timeout");
                return false;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_is_not_ready() {
        assert!(!all_ready(&[]));
        assert!(all_ready(&[ServiceReplicas::new("a", 2, 2)]));
        assert!(!all_ready(&[
            ServiceReplicas::new("a", 1, 1),
            ServiceReplicas::new("b", 0, 1),
        ]));
    }
}
