// ABOUTME: Public/private keypair authentication strategy.
// ABOUTME: Both key paths are required; the passphrase is optional.

use super::{Authentication, verdict};
use crate::error::{Error, Result};
use crate::transport::Connection;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Default)]
pub struct Keypair {
    username: Option<String>,
    public_key: Option<PathBuf>,
    private_key: Option<PathBuf>,
    passphrase: Option<String>,
}

impl Keypair {
    pub fn new(
        username: impl Into<String>,
        public_key: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            public_key: Some(public_key.into()),
            private_key: Some(private_key.into()),
            passphrase: None,
        }
    }

    pub fn from_parts(
        username: Option<String>,
        public_key: Option<PathBuf>,
        private_key: Option<PathBuf>,
    ) -> Self {
        Self {
            username,
            public_key,
            private_key,
            passphrase: None,
        }
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("username", &self.username)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Authentication for Keypair {
    fn client(&self) -> Option<&str> {
        self.username.as_deref()
    }

    async fn authenticate_as(&self, connection: &mut dyn Connection, user: &str) -> Result<()> {
        let (Some(public_key), Some(private_key)) = (&self.public_key, &self.private_key) else {
            return Err(Error::Configuration(
                "keypair authentication requires both public and private key paths".to_string(),
            ));
        };

        let result = connection
            .authenticate_keypair(user, public_key, private_key, self.passphrase.as_deref())
            .await;
        verdict(user, "keypair", result)
    }
}
