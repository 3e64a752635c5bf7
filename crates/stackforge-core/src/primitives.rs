//! # Primitives
//!
//! Fixed constants shared by the planner and the app layer.
//! These are compiled into the binary and are immutable at runtime.

// =============================================================================
// SHARED CLUSTER OBJECTS
// =============================================================================

/// Public overlay network the reverse proxy routes through.
pub const PUBLIC_NETWORK: &str = "externa";

/// Private overlay network for service-to-service traffic.
pub const INTERNAL_NETWORK: &str = "interna";

/// Overlay network between the management UI and its node agents.
pub const AGENT_NETWORK: &str = "agent_network";

/// Driver used when creating any shared network.
pub const NETWORK_DRIVER: &str = "overlay";

/// Stack id of the remote management API. It is always deployed through the
/// direct backend since it cannot deploy itself.
pub const MANAGEMENT_STACK: &str = "portainer";

/// Stack id of the reverse proxy.
pub const PROXY_STACK: &str = "traefik";

// =============================================================================
// MANIFEST FORMAT
// =============================================================================

/// Compose file format version written at the top of every manifest.
pub const COMPOSE_VERSION: &str = "3.8";

/// Placement constraint pinning single-replica stateful services to the
/// cluster's decision-making node role.
pub const MANAGER_CONSTRAINT: &str = "node.role == manager";

/// Name of the ACME certificate resolver configured on the reverse proxy.
pub const CERT_RESOLVER: &str = "le";

/// TLS entrypoint every routing rule binds to.
pub const SECURE_ENTRYPOINT: &str = "websecure";

/// Proxy entrypoint forwarding raw TCP to the connection pooler.
pub const POOLER_ENTRYPOINT: &str = "pgbouncer";

/// Port of the pooler, on the proxy entrypoint and on the pooler itself.
pub const POOLER_PORT: u16 = 6432;

// =============================================================================
// SECRET GENERATION
// =============================================================================

/// Alphabet of generated secrets: ASCII letters followed by digits.
pub const SECRET_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Default length of generated passwords.
pub const DEFAULT_SECRET_LENGTH: usize = 16;

/// Length of generated administrator passwords.
pub const ADMIN_PASSWORD_LENGTH: usize = 12;

/// Length of generated API keys.
pub const API_KEY_LENGTH: usize = 32;

/// Length of generated framework secret keys (session signing and the like).
pub const FRAMEWORK_KEY_LENGTH: usize = 64;

// =============================================================================
// READINESS
// =============================================================================

/// Interval between two readiness polls, in milliseconds.
pub const READINESS_POLL_INTERVAL_MS: u64 = 1000;

/// Default readiness timeout per stack, in seconds.
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 120;

/// Attempts made while waiting for the management API to come up.
pub const MANAGEMENT_STATUS_ATTEMPTS: u32 = 30;

/// Delay between two management API status probes, in milliseconds.
pub const MANAGEMENT_STATUS_DELAY_MS: u64 = 2000;
