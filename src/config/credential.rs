// ABOUTME: Credential section of the configuration file.
// ABOUTME: Converts password and keypair entries into authentication strategies.

use super::env_value::{EnvValue, resolve_optional};
use crate::auth::{Authentication, Keypair, Password};
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialConfig {
    Password {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<EnvValue>,
    },
    Keypair {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        public_key: Option<PathBuf>,
        #[serde(default)]
        private_key: Option<PathBuf>,
        #[serde(default)]
        passphrase: Option<EnvValue>,
    },
}

impl CredentialConfig {
    /// Build the strategy, falling back to `default_user` when no username is given.
    ///
    /// A keypair entry with neither key path uses the first default key found
    /// under `~/.ssh`.
    pub fn into_authentication(
        self,
        default_user: Option<&str>,
    ) -> Result<Arc<dyn Authentication>> {
        match self {
            CredentialConfig::Password { username, password } => {
                let username = username.or_else(|| default_user.map(str::to_string));
                let password = resolve_optional(password.as_ref())?;
                Ok(Arc::new(Password::from_parts(username, password)))
            }
            CredentialConfig::Keypair {
                username,
                public_key,
                private_key,
                passphrase,
            } => {
                let username = username.or_else(|| default_user.map(str::to_string));
                let (public_key, private_key) = match (public_key, private_key) {
                    (None, None) => match default_keypair() {
                        Some((public, private)) => (Some(public), Some(private)),
                        None => (None, None),
                    },
                    (public, private) => (public.map(expand_home), private.map(expand_home)),
                };
                let mut keypair = Keypair::from_parts(username, public_key, private_key);
                if let Some(passphrase) = resolve_optional(passphrase.as_ref())? {
                    keypair = keypair.passphrase(passphrase);
                }
                Ok(Arc::new(keypair))
            }
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            CredentialConfig::Password { username, .. }
            | CredentialConfig::Keypair { username, .. } => username.as_deref(),
        }
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: PathBuf) -> PathBuf {
    let rest = path.strip_prefix("~").ok().map(Path::to_path_buf);
    match (rest, std::env::var("HOME")) {
        (Some(rest), Ok(home)) => Path::new(&home).join(rest),
        _ => path,
    }
}

fn default_keypair() -> Option<(PathBuf, PathBuf)> {
    let home = std::env::var("HOME").ok()?;
    let ssh_dir = Path::new(&home).join(".ssh");
    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| (ssh_dir.join(format!("{}.pub", name)), ssh_dir.join(name)))
        .find(|(public, private)| public.exists() && private.exists())
}
