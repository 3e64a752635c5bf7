//! # Secret and Config Store
//!
//! Persistence of the two flat JSON documents (deployment config and
//! management credentials) plus secret generation.
//!
//! ## Write discipline
//!
//! Every save writes a sibling temp file, restricts it to the owner and
//! renames it over the target, so a crash mid-write leaves the previous
//! document intact.

use crate::error::DeployError;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stackforge_core::primitives::SECRET_ALPHABET;
use stackforge_core::{DeploymentConfig, SecretKind, secrets_for, spec_for_key};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// =============================================================================
// SECRET GENERATION
// =============================================================================

/// Random string over letters and digits from the thread-local CSPRNG.
pub fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(SECRET_ALPHABET[rng.random_range(0..SECRET_ALPHABET.len())]))
        .collect()
}

/// First-use value for a policy entry.
pub fn initial_value(kind: SecretKind) -> String {
    match kind {
        SecretKind::Default(value) => value.to_string(),
        other => generate_secret(
            other
                .length()
                .unwrap_or(stackforge_core::primitives::DEFAULT_SECRET_LENGTH),
        ),
    }
}

// =============================================================================
// JSON DOCUMENTS
// =============================================================================

/// Read a JSON document, `None` if the file does not exist yet.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DeployError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DeployError::store(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DeployError::store(path, e)),
    }
}

/// Write a JSON document temp-then-rename, mode 0600 on Unix.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DeployError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| DeployError::store(path, e))?;
    write_private(path, text.as_bytes())
}

/// Atomically replace `path` with `bytes`, readable by the owner only.
pub fn write_private(path: &Path, bytes: &[u8]) -> Result<(), DeployError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeployError::store(parent, e))?;
    }
    let temp = path.with_extension("tmp");
    std::fs::write(&temp, bytes).map_err(|e| DeployError::store(&temp, e))?;
    restrict_to_owner(&temp)?;
    std::fs::rename(&temp, path).map_err(|e| DeployError::store(path, e))
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), DeployError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| DeployError::store(path, e))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), DeployError> {
    Ok(())
}

// =============================================================================
// CONFIG STORE
// =============================================================================

/// Load/save of the deployment config document.
pub trait ConfigStore: Send + Sync {
    /// Empty config on first run.
    fn load(&self) -> Result<DeploymentConfig, DeployError>;
    fn save(&self, config: &DeploymentConfig) -> Result<(), DeployError>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn load(&self) -> Result<DeploymentConfig, DeployError> {
        (**self).load()
    }

    fn save(&self, config: &DeploymentConfig) -> Result<(), DeployError> {
        (**self).save(config)
    }
}

/// `config.json` in the state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<DeploymentConfig, DeployError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    fn save(&self, config: &DeploymentConfig) -> Result<(), DeployError> {
        write_json(&self.path, config)?;
        debug!(path = %self.path.display(), keys = config.len(), "Saved deployment config");
        Ok(())
    }
}

/// In-memory store for dry runs and tests. Counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: Mutex<DeploymentConfig>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(config: DeploymentConfig) -> Self {
        Self {
            config: Mutex::new(config),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> DeploymentConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<DeploymentConfig, DeployError> {
        Ok(self.snapshot())
    }

    fn save(&self, config: &DeploymentConfig) -> Result<(), DeployError> {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// SECRET STORE
// =============================================================================

/// The deployment config loaded once per run, with every mutation flushed
/// through one save path.
pub struct SecretStore {
    store: Box<dyn ConfigStore>,
    config: DeploymentConfig,
}

impl SecretStore {
    pub fn open(store: impl ConfigStore + 'static) -> Result<Self, DeployError> {
        let config = store.load()?;
        Ok(Self {
            store: Box::new(store),
            config,
        })
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Present and non-empty in the loaded config.
    fn stored(&self, key: &str) -> Option<&str> {
        self.config.get(key).filter(|v| !v.is_empty())
    }

    /// Persist `next`, then adopt it. A failed save leaves the in-memory
    /// config untouched, so nothing unsaved is ever handed out.
    fn commit(&mut self, next: DeploymentConfig) -> Result<(), DeployError> {
        self.store.save(&next)?;
        self.config = next;
        Ok(())
    }

    /// Existing value of `key`, or a fresh one from `generator` which is
    /// persisted before returning.
    pub fn get_or_generate(
        &mut self,
        key: &str,
        generator: impl FnOnce() -> String,
    ) -> Result<String, DeployError> {
        if let Some(existing) = self.stored(key) {
            return Ok(existing.to_string());
        }
        let value = generator();
        let mut next = self.config.clone();
        next.insert(key, value.clone());
        self.commit(next)?;
        info!(key, "Generated secret");
        Ok(value)
    }

    /// Make sure every key owned by `stack_id` exists. Returns the keys that
    /// were generated by this call; nothing is saved if none were, and all
    /// of them are saved together otherwise.
    pub fn ensure_for_stack(&mut self, stack_id: &str) -> Result<Vec<&'static str>, DeployError> {
        let missing: Vec<_> = secrets_for(stack_id)
            .iter()
            .filter(|spec| self.stored(spec.key).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        let mut next = self.config.clone();
        for spec in &missing {
            next.insert(spec.key, initial_value(spec.kind));
        }
        self.commit(next)?;
        let generated: Vec<&'static str> = missing.iter().map(|spec| spec.key).collect();
        info!(stack = stack_id, keys = ?generated, "Generated stack secrets");
        Ok(generated)
    }

    /// Set one value explicitly (operator-supplied settings).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DeployError> {
        let mut next = self.config.clone();
        next.insert(key, value);
        self.commit(next)
    }

    /// Overwrite one policy-managed secret with a fresh value, leaving every
    /// other key untouched.
    pub fn rotate(&mut self, key: &str) -> Result<String, DeployError> {
        let spec = spec_for_key(key)
            .ok_or_else(|| DeployError::Settings(format!("'{key}' is not a managed secret")))?;
        let length = spec.kind.length().ok_or_else(|| {
            DeployError::Settings(format!("'{key}' is a fixed parameter, set it instead"))
        })?;
        let value = generate_secret(length);
        let mut next = self.config.clone();
        next.insert(key, value.clone());
        self.commit(next)?;
        info!(key, "Rotated secret");
        Ok(value)
    }
}

// =============================================================================
// MANAGEMENT CREDENTIALS
// =============================================================================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementCredentials {
    #[serde(rename = "PORTAINER_USERNAME")]
    pub username: String,
    #[serde(rename = "PORTAINER_PASSWORD")]
    pub password: String,
}

impl fmt::Debug for ManagementCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `credentials.json` in the state directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<ManagementCredentials>, DeployError> {
        read_json(&self.path)
    }

    pub fn save(&self, credentials: &ManagementCredentials) -> Result<(), DeployError> {
        write_json(&self.path, credentials)
    }
}
