// ABOUTME: Authentication strategies used by the session during connect.
// ABOUTME: Password and keypair variants share username handling through the trait.

mod keypair;
mod password;

pub use keypair::Keypair;
pub use password::Password;

use crate::error::{Error, Result};
use crate::transport::Connection;
use async_trait::async_trait;

/// Proves a client identity to an open connection.
#[async_trait]
pub trait Authentication: Send + Sync + std::fmt::Debug {
    /// The client identifier (username), if configured.
    fn client(&self) -> Option<&str>;

    /// Variant-specific step, called once the username is known to be present.
    async fn authenticate_as(&self, connection: &mut dyn Connection, user: &str) -> Result<()>;

    /// Authenticate `connection`, failing early when no username is configured.
    async fn authenticate(&self, connection: &mut dyn Connection) -> Result<()> {
        let user = match self.client() {
            Some(user) if !user.is_empty() => user,
            _ => {
                return Err(Error::Configuration(
                    "a username is required for authentication".to_string(),
                ));
            }
        };
        self.authenticate_as(connection, user).await
    }
}

/// Map a transport verdict onto the error taxonomy.
pub(crate) fn verdict(
    user: &str,
    method: &str,
    result: std::result::Result<bool, crate::transport::TransportError>,
) -> Result<()> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::debug!(user, method, "credential rejected");
            Err(Error::Authentication {
                client: user.to_string(),
                host: String::new(),
                source: format!("{method} rejected").into(),
            })
        }
        Err(e) => {
            tracing::debug!(user, method, error = %e, "authentication error");
            Err(Error::Authentication {
                client: user.to_string(),
                host: String::new(),
                source: e.into(),
            })
        }
    }
}
