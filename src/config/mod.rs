// ABOUTME: Configuration types and parsing for shellfs.yml.
// ABOUTME: Handles YAML parsing, file discovery, and conversion into a SessionConfig.

mod credential;
mod env_value;
mod target;

pub use credential::CredentialConfig;
pub use env_value::EnvValue;
pub use target::Target;

use crate::error::{Error, Result};
use crate::session::{HostKeyRegistry, SessionConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "shellfs.yml";
pub const CONFIG_FILENAME_ALT: &str = "shellfs.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shellfs/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `host`, `user@host`, `host:port`, or `user@host:port`.
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub credential: Option<CredentialConfig>,

    #[serde(default = "default_host_key_verification")]
    pub host_key_verification: bool,

    #[serde(default)]
    pub host_keys: BTreeMap<String, String>,

    #[serde(default)]
    pub host_key_file: Option<PathBuf>,

    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

fn default_host_key_verification() -> bool {
    true
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn target(&self) -> Result<Target> {
        Target::parse(&self.host).map_err(Error::Configuration)
    }

    /// Port from the explicit field, then the host shorthand, then 22.
    pub fn port(&self) -> Result<u16> {
        Ok(self.port.or(self.target()?.port).unwrap_or(22))
    }

    /// Build a session configuration, loading any persisted host keys.
    ///
    /// Pinned `host_keys` entries take precedence over the host key file.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let target = self.target()?;
        let port = self.port()?;

        let mut registry: HostKeyRegistry = self.host_keys.clone().into_iter().collect();
        if let Some(path) = &self.host_key_file {
            registry.extend(&HostKeyRegistry::load(path)?);
        }

        let mut session = SessionConfig::new(target.host)
            .port(port)
            .host_key_verification(self.host_key_verification)
            .host_keys(registry);

        if let Some(credential) = self.credential.clone() {
            session.credential = Some(credential.into_authentication(target.user.as_deref())?);
        }
        if let Some(path) = &self.host_key_file {
            session = session.host_key_file(path);
        }
        if let Some(timeout) = self.command_timeout {
            session = session.command_timeout(timeout);
        }
        Ok(session)
    }

    pub fn template() -> Self {
        Config {
            host: "deploy@server.example.com".to_string(),
            port: Some(22),
            credential: Some(CredentialConfig::Keypair {
                username: None,
                public_key: Some(PathBuf::from("~/.ssh/id_ed25519.pub")),
                private_key: Some(PathBuf::from("~/.ssh/id_ed25519")),
                passphrase: None,
            }),
            host_key_verification: true,
            host_keys: BTreeMap::new(),
            host_key_file: Some(PathBuf::from(".shellfs/known_hosts.yml")),
            command_timeout: None,
        }
    }
}

pub fn init_config(dir: &Path, host: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(h) = host {
        Target::parse(h).map_err(Error::Configuration)?;
        config.host = h.to_string();
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"host: {}
port: {}
credential:
  type: keypair
  public_key: ~/.ssh/id_ed25519.pub
  private_key: ~/.ssh/id_ed25519
  # passphrase:
  #   env: SHELLFS_PASSPHRASE
host_key_verification: true
host_key_file: .shellfs/known_hosts.yml
"#,
        config.host,
        config.port.unwrap_or(22)
    )
}
