//! # Settings
//!
//! Operator settings from `stackforge.toml` in the state directory, with
//! environment overrides applied on top. Every field has a default, so a
//! missing file is a valid configuration.

use crate::error::DeployError;
use serde::Deserialize;
use stackforge_core::primitives::{DEFAULT_READINESS_TIMEOUT_SECS, READINESS_POLL_INTERVAL_MS};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOME_ENV: &str = "STACKFORGE_HOME";
pub const API_URL_ENV: &str = "STACKFORGE_API_URL";
pub const BACKEND_ENV: &str = "STACKFORGE_BACKEND";

const SETTINGS_FILE: &str = "stackforge.toml";

// =============================================================================
// STATE DIRECTORY
// =============================================================================

/// Layout of the state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `--home`, else `$STACKFORGE_HOME`, else `~/.stackforge`, else
    /// `./.stackforge`.
    pub fn locate(flag: Option<PathBuf>) -> Self {
        let root = flag
            .or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".stackforge")))
            .unwrap_or_else(|| PathBuf::from(".stackforge"));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Which backends a run may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Management API first, direct CLI as fallback.
    Auto,
    /// Direct CLI only.
    Cli,
}

impl std::str::FromStr for BackendMode {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cli" => Ok(Self::Cli),
            other => Err(DeployError::Settings(format!(
                "unknown backend '{other}' (expected auto or cli)"
            ))),
        }
    }
}

/// Stack type sent to the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    Swarm,
    Standalone,
}

impl StackType {
    /// Numeric `type` query parameter of the stack-creation endpoint.
    pub fn api_code(self) -> u8 {
        match self {
            Self::Swarm => 1,
            Self::Standalone => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base URL of the management API.
    pub api_url: String,
    /// Administrator account created on first bootstrap.
    pub username: String,
    pub backend: BackendMode,
    pub stack_type: StackType,
    pub readiness_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound for one cluster CLI invocation.
    pub command_timeout_secs: u64,
    /// Domain-label overrides keyed by `<id>` or `<id>_console`.
    pub prefixes: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:9000".to_string(),
            username: "admin".to_string(),
            backend: BackendMode::Auto,
            stack_type: StackType::Swarm,
            readiness_timeout_secs: DEFAULT_READINESS_TIMEOUT_SECS,
            poll_interval_ms: READINESS_POLL_INTERVAL_MS,
            command_timeout_secs: 300,
            prefixes: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load the settings file if present, then apply environment overrides.
    pub fn load(state: &StateDir) -> Result<Self, DeployError> {
        let path = state.settings_path();
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(DeployError::store(&path, e)),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn parse(text: &str) -> Result<Self, DeployError> {
        toml::from_str(text).map_err(|e| DeployError::Settings(e.to_string()))
    }

    /// Apply `STACKFORGE_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), DeployError> {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(mode) = lookup(BACKEND_ENV).filter(|v| !v.is_empty()) {
            self.backend = mode.parse()?;
        }
        Ok(())
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::parse("").expect("parse");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.stack_type.api_code(), 1);
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn file_values_and_prefixes() {
        let settings = Settings::parse(
            r#"
            api_url = "https://portainer.example.com"
            backend = "cli"
            stack_type = "standalone"
            readiness_timeout_secs = 30

            [prefixes]
            grafana = "dash"
            "#,
        )
        .expect("parse");
        assert_eq!(settings.backend, BackendMode::Cli);
        assert_eq!(settings.stack_type.api_code(), 3);
        assert_eq!(settings.readiness_timeout(), Duration::from_secs(30));
        assert_eq!(settings.prefixes.get("grafana").map(String::as_str), Some("dash"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Settings::parse("colour = \"blue\""),
            Err(DeployError::Settings(_))
        ));
    }

    #[test]
    fn environment_overrides_win() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| match key {
                API_URL_ENV => Some("http://10.0.0.5:9000".into()),
                BACKEND_ENV => Some("CLI".into()),
                _ => None,
            })
            .expect("overrides");
        assert_eq!(settings.api_url, "http://10.0.0.5:9000");
        assert_eq!(settings.backend, BackendMode::Cli);
    }

    #[test]
    fn bad_backend_override_is_an_error() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(|key| (key == BACKEND_ENV).then(|| "ftp".into()));
        assert!(result.is_err());
    }

    #[test]
    fn state_dir_layout() {
        let state = StateDir::new("/tmp/sf");
        assert_eq!(state.config_path(), PathBuf::from("/tmp/sf/config.json"));
        assert_eq!(state.manifests_dir(), PathBuf::from("/tmp/sf/manifests"));
        assert_eq!(StateDir::locate(Some("/x".into())).root(), Path::new("/x"));
    }
}
