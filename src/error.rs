// ABOUTME: Application-wide error types for shellfs.
// ABOUTME: Uses thiserror for the taxonomy shared by session, auth, and file system layers.

use crate::remote::FileSystemError;
use crate::transport::TransportError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("host key mismatch for {host}: expected {expected}, got {actual}")]
    Security {
        host: String,
        expected: String,
        actual: String,
    },

    #[error("authentication failed for {client}@{host}: {source}")]
    Authentication {
        client: String,
        host: String,
        #[source]
        source: BoxError,
    },

    #[error("command `{command}` failed on {host}: {stderr}")]
    Execution {
        host: String,
        command: String,
        stderr: String,
    },

    #[error("command `{command}` on {host} timed out after {timeout:?}")]
    CommandTimeout {
        host: String,
        command: String,
        timeout: Duration,
    },

    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Underlying cause carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
