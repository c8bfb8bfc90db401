// ABOUTME: Host key registry for trust-on-first-use verification.
// ABOUTME: Maps "host:port" or bare "host" to a key fingerprint, optionally persisted as YAML.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Outcome of checking a live fingerprint against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyCheck {
    /// A stored entry matches the live fingerprint.
    Trusted,
    /// No entry exists for this host.
    Unknown,
    /// A stored entry disagrees with the live fingerprint.
    Mismatch { expected: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostKeyRegistry {
    entries: BTreeMap<String, String>,
}

impl HostKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    /// Look up `host:port` first, then `host` alone.
    pub fn lookup(&self, host: &str, port: u16) -> Option<&str> {
        self.entries
            .get(&Self::key(host, port))
            .or_else(|| self.entries.get(host))
            .map(String::as_str)
    }

    pub fn check(&self, host: &str, port: u16, fingerprint: &str) -> HostKeyCheck {
        match self.lookup(host, port) {
            Some(stored) if stored == fingerprint => HostKeyCheck::Trusted,
            Some(stored) => HostKeyCheck::Mismatch {
                expected: stored.to_string(),
            },
            None => HostKeyCheck::Unknown,
        }
    }

    /// Record a fingerprint under `host:port`. Existing entries are left untouched.
    pub fn trust(&mut self, host: &str, port: u16, fingerprint: impl Into<String>) -> bool {
        if self.lookup(host, port).is_some() {
            return false;
        }
        self.entries.insert(Self::key(host, port), fingerprint.into());
        true
    }

    /// Pin an entry explicitly, e.g. from configuration.
    pub fn insert(&mut self, key: impl Into<String>, fingerprint: impl Into<String>) {
        self.entries.insert(key.into(), fingerprint.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Load a registry file; a missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Merge entries from `other` without overwriting existing ones.
    pub fn extend(&mut self, other: &HostKeyRegistry) {
        for (k, v) in &other.entries {
            self.entries.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HostKeyRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
