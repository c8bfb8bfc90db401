// ABOUTME: Password authentication strategy.
// ABOUTME: Requires a non-empty password alongside the username.

use super::{Authentication, verdict};
use crate::error::{Error, Result};
use crate::transport::Connection;
use async_trait::async_trait;
use std::fmt;

#[derive(Clone)]
pub struct Password {
    username: Option<String>,
    password: Option<String>,
}

impl Password {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Build from optional parts; missing values surface when authenticating.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Authentication for Password {
    fn client(&self) -> Option<&str> {
        self.username.as_deref()
    }

    async fn authenticate_as(&self, connection: &mut dyn Connection, user: &str) -> Result<()> {
        let password = match self.password.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(Error::Configuration(
                    "password authentication requires a password".to_string(),
                ));
            }
        };

        let result = connection.authenticate_password(user, password).await;
        verdict(user, "password", result)
    }
}
