//! # Error Types
//!
//! `DeployError` covers everything that can go wrong once a plan leaves the
//! core crate. Errors local to one stack are caught at the per-stack
//! boundary of the installer and recorded in its `DeploymentResult`; only
//! planning errors abort a run.

use stackforge_core::{ResourceKind, StackforgeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    /// Creating a shared network, volume or config failed.
    #[error("Failed to create {kind} '{name}': {detail}")]
    ResourceProvision {
        kind: ResourceKind,
        name: String,
        detail: String,
    },

    /// The management API refused the credentials.
    #[error("Management API rejected the credentials: {0}")]
    BackendAuth(String),

    /// The management API could not be reached.
    #[error("Management API unreachable: {0}")]
    BackendUnreachable(String),

    /// The management API answered with a non-success status.
    #[error("Management API returned {status}: {detail}")]
    BackendRejected { status: u16, detail: String },

    /// Both the management API and the direct CLI failed for one stack.
    #[error("API deploy failed ({primary}); CLI fallback failed too ({fallback})")]
    FallbackFailed { primary: String, fallback: String },

    /// The manifest could not be written to its stable path.
    #[error("Cannot write manifest {path}: {detail}")]
    ManifestWrite { path: String, detail: String },

    /// The stack did not converge in time. Recorded as a warning on a
    /// deployed stack, never as a failure.
    #[error("Stack '{stack}' not ready after {secs}s; left deployed, inspect its logs")]
    ReadinessTimeout { stack: String, secs: u64 },

    /// A cluster CLI invocation failed or timed out.
    #[error("`{command}` failed: {detail}")]
    Command { command: String, detail: String },

    /// Reading or writing a persisted JSON document failed.
    #[error("Store error at {path}: {detail}")]
    Store { path: String, detail: String },

    /// The settings file or an environment override is invalid.
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Run cancelled")]
    Cancelled,

    /// The run finished but at least one stack failed.
    #[error("{failed} stack(s) failed")]
    RunFailed { failed: usize },

    #[error(transparent)]
    Core(#[from] StackforgeError),
}

impl DeployError {
    pub(crate) fn store(path: &std::path::Path, detail: impl std::fmt::Display) -> Self {
        Self::Store {
            path: path.display().to_string(),
            detail: detail.to_string(),
        }
    }
}
