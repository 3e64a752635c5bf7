//! Integration tests for the on-disk config and credential stores.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use stackforge::store::{read_json, write_json};
use stackforge::{
    ConfigStore, CredentialStore, DeployError, JsonFileStore, ManagementCredentials, MemoryStore,
    SecretStore,
};
use stackforge_core::DeploymentConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// JSON FILE STORE
// =============================================================================

#[test]
fn test_first_run_loads_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("config.json"));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("nested").join("config.json"));
    let mut config = DeploymentConfig::new();
    config.insert("base_domain", "example.com");
    config.insert("redis_password", "abc123");

    store.save(&config).unwrap();

    assert_eq!(store.load().unwrap(), config);
    let text = std::fs::read_to_string(store.path()).unwrap();
    assert!(text.contains("\"base_domain\": \"example.com\""));
    assert!(!dir.path().join("nested").join("config.tmp").exists());
}

#[cfg(unix)]
#[test]
fn test_saved_files_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("config.json"));
    store.save(&DeploymentConfig::new()).unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_corrupt_file_is_a_store_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = JsonFileStore::new(&path).load().unwrap_err();
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn test_overwrite_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut secrets = SecretStore::open(JsonFileStore::new(&path)).unwrap();
    secrets.set("base_domain", "example.com").unwrap();
    let generated = secrets.ensure_for_stack("postgres").unwrap();
    assert_eq!(generated, vec!["postgres_password"]);
    let rotated = secrets.rotate("postgres_password").unwrap();

    let reloaded = JsonFileStore::new(&path).load().unwrap();
    assert_eq!(reloaded.get("base_domain"), Some("example.com"));
    assert_eq!(reloaded.get("postgres_password"), Some(rotated.as_str()));
}

// =============================================================================
// GET OR GENERATE
// =============================================================================

#[test]
fn test_get_or_generate_twice_returns_same_value_and_writes_once() {
    let backing = Arc::new(MemoryStore::default());
    let mut secrets = SecretStore::open(Arc::clone(&backing)).unwrap();

    let first = secrets
        .get_or_generate("grafana_password", || "first".to_string())
        .unwrap();
    let second = secrets
        .get_or_generate("grafana_password", || "second".to_string())
        .unwrap();

    assert_eq!(first, "first");
    assert_eq!(first, second);
    assert_eq!(backing.save_count(), 1);
}

#[test]
fn test_existing_secret_survives_new_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let first = {
        let mut secrets = SecretStore::open(JsonFileStore::new(&path)).unwrap();
        secrets.ensure_for_stack("redis").unwrap();
        secrets.config().get("redis_password").unwrap().to_string()
    };

    let mut secrets = SecretStore::open(JsonFileStore::new(&path)).unwrap();
    assert!(secrets.ensure_for_stack("redis").unwrap().is_empty());
    assert_eq!(secrets.config().get("redis_password"), Some(first.as_str()));
}

// =============================================================================
// CREDENTIALS
// =============================================================================

#[test]
fn test_credentials_use_documented_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("credentials.json"));
    assert!(store.load().unwrap().is_none());

    let credentials = ManagementCredentials {
        username: "admin".into(),
        password: "pw123456789x".into(),
    };
    store.save(&credentials).unwrap();

    assert_eq!(store.load().unwrap(), Some(credentials));
    let raw: serde_json::Value = read_json(&dir.path().join("credentials.json"))
        .unwrap()
        .unwrap();
    assert_eq!(raw["PORTAINER_USERNAME"], "admin");
    assert_eq!(raw["PORTAINER_PASSWORD"], "pw123456789x");
}

#[test]
fn test_write_json_replaces_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    write_json(&path, &serde_json::json!({ "a": 1 })).unwrap();
    write_json(&path, &serde_json::json!({ "b": 2 })).unwrap();

    let doc: serde_json::Value = read_json(&path).unwrap().unwrap();
    assert!(doc.get("a").is_none());
    assert_eq!(doc["b"], 2);
}

// =============================================================================
// FAILED SAVES
// =============================================================================

/// In-memory store whose next `failures` saves are refused.
struct Unreliable {
    inner: MemoryStore,
    failures: AtomicUsize,
}

impl Unreliable {
    fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::default(),
            failures: AtomicUsize::new(times),
        })
    }
}

impl ConfigStore for Unreliable {
    fn load(&self) -> Result<DeploymentConfig, DeployError> {
        self.inner.load()
    }

    fn save(&self, config: &DeploymentConfig) -> Result<(), DeployError> {
        let refuse = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refuse {
            return Err(DeployError::Store {
                path: "config.json".into(),
                detail: "disk full".into(),
            });
        }
        self.inner.save(config)
    }
}

#[test]
fn test_failed_save_does_not_keep_generated_value() {
    let backing = Unreliable::failing(1);
    let mut secrets = SecretStore::open(Arc::clone(&backing)).unwrap();

    assert!(
        secrets
            .get_or_generate("grafana_password", || "first".to_string())
            .is_err()
    );
    assert!(secrets.config().get("grafana_password").is_none());

    let value = secrets
        .get_or_generate("grafana_password", || "second".to_string())
        .unwrap();
    assert_eq!(value, "second");
    assert_eq!(backing.inner.snapshot().get("grafana_password"), Some("second"));
}

#[test]
fn test_failed_save_leaves_stack_secrets_to_retry() {
    let backing = Unreliable::failing(1);
    let mut secrets = SecretStore::open(Arc::clone(&backing)).unwrap();

    assert!(secrets.ensure_for_stack("postgres").is_err());
    assert!(!secrets.config().contains("postgres_password"));

    let generated = secrets.ensure_for_stack("postgres").unwrap();
    assert_eq!(generated, vec!["postgres_password"]);
    let stored = backing.inner.snapshot();
    assert_eq!(
        stored.get("postgres_password"),
        secrets.config().get("postgres_password")
    );
}

#[test]
fn test_failed_rotate_and_set_keep_previous_values() {
    let backing = Unreliable::failing(0);
    let mut secrets = SecretStore::open(Arc::clone(&backing)).unwrap();
    secrets.set("base_domain", "example.com").unwrap();
    secrets.ensure_for_stack("redis").unwrap();
    let before = secrets.config().clone();

    backing.failures.store(2, Ordering::SeqCst);
    assert!(secrets.rotate("redis_password").is_err());
    assert!(secrets.set("base_domain", "other.org").is_err());

    assert_eq!(secrets.config(), &before);
    assert_eq!(backing.inner.snapshot(), before);
}

#[test]
fn test_empty_stored_value_is_regenerated() {
    let mut seeded = DeploymentConfig::new();
    seeded.insert("postgres_password", "");
    seeded.insert("redis_password", "");
    let backing = Arc::new(MemoryStore::new(seeded));
    let mut secrets = SecretStore::open(Arc::clone(&backing)).unwrap();

    assert_eq!(
        secrets.ensure_for_stack("postgres").unwrap(),
        vec!["postgres_password"]
    );
    assert_eq!(secrets.config().get("postgres_password").unwrap().len(), 16);

    let redis = secrets
        .get_or_generate("redis_password", || "fresh".to_string())
        .unwrap();
    assert_eq!(redis, "fresh");
    assert_eq!(backing.save_count(), 2);
}
