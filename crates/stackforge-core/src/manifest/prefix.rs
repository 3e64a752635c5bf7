//! Domain-name labels per stack, built once per run.

use crate::catalog::Catalog;
use std::collections::BTreeMap;

/// Suffix of the key holding a stack's secondary console label.
pub const CONSOLE_SUFFIX: &str = "_console";

/// Maps `<id>` and `<id>_console` to the label placed in front of the base
/// domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMap {
    labels: BTreeMap<String, String>,
}

impl PrefixMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog defaults: every stack's domain prefix, plus the console
    /// prefix of stacks that have one.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut map = Self::new();
        for descriptor in catalog.descriptors() {
            map.set(descriptor.id, descriptor.domain_prefix);
            if let Some(console) = descriptor.console_prefix {
                map.set(console_key(descriptor.id), console);
            }
        }
        map
    }

    /// Override one label.
    pub fn set(&mut self, key: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(key.into(), label.into());
    }

    /// Apply overrides on top of the current labels.
    #[must_use]
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, label) in overrides {
            self.set(key.clone(), label.clone());
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Label for `key`, falling back to the key itself.
    #[must_use]
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).unwrap_or(key)
    }

    /// Fully qualified host `<label>.<base_domain>`.
    #[must_use]
    pub fn host_for(&self, key: &str, base_domain: &str) -> String {
        format!("{}.{}", self.label(key), base_domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Key of the console label of `id`.
#[must_use]
pub fn console_key(id: &str) -> String {
    format!("{id}{CONSOLE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_defaults() {
        let map = PrefixMap::from_catalog(&Catalog::builtin());
        assert_eq!(map.get("redis"), Some("redis"));
        assert_eq!(map.get("stirlingpdf"), Some("pdf"));
        assert_eq!(map.get("dozzle"), Some("logs"));
        assert_eq!(map.get("minio_console"), Some("console.minio"));
        assert_eq!(map.get("redis_console"), None);
    }

    #[test]
    fn overrides_win() {
        let overrides = BTreeMap::from([("grafana".to_string(), "dash".to_string())]);
        let map = PrefixMap::from_catalog(&Catalog::builtin()).with_overrides(&overrides);
        assert_eq!(map.host_for("grafana", "example.com"), "dash.example.com");
    }

    #[test]
    fn unknown_key_falls_back_to_itself() {
        let map = PrefixMap::new();
        assert_eq!(map.host_for("custom", "example.com"), "custom.example.com");
    }
}
