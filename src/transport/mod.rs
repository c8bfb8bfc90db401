// ABOUTME: Transport seam between the session manager and the SSH library.
// ABOUTME: Defines connection, command, and stat-channel traits plus the russh implementation.

mod error;
mod ssh;

pub use self::error::TransportError;
pub use self::ssh::RusshTransport;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// File-type mask of a POSIX mode.
pub const S_IFMT: u32 = 0o170000;
/// Directory file type.
pub const S_IFDIR: u32 = 0o040000;
/// Owner read permission.
pub const S_IRUSR: u32 = 0o400;
/// Owner write permission.
pub const S_IWUSR: u32 = 0o200;

/// Raw output of a remote command, before any line splitting.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status reported by the transport, if it has a native channel for it.
    pub exit_status: Option<u32>,
    /// Signal that terminated the command, when it did not exit normally.
    pub exit_signal: Option<String>,
}

/// Attributes of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mode: u32,
    pub size: Option<u64>,
    pub mtime: Option<u64>,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_owner_readable(&self) -> bool {
        self.mode & S_IRUSR != 0
    }

    pub fn is_owner_writable(&self) -> bool {
        self.mode & S_IWUSR != 0
    }

    /// Permission bits without the file type.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Opens connections to remote hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open, possibly unauthenticated, connection to one host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Fingerprint of the key the server presented during the handshake.
    fn fingerprint(&self) -> Option<String>;

    /// Whether `execute` reports exit statuses natively.
    fn reports_exit_status(&self) -> bool {
        true
    }

    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<bool, TransportError>;

    async fn authenticate_keypair(
        &mut self,
        user: &str,
        public_key: &Path,
        private_key: &Path,
        passphrase: Option<&str>,
    ) -> Result<bool, TransportError>;

    /// Run a command and drain both output streams.
    async fn execute(&self, command: &str) -> Result<RawOutput, TransportError>;

    async fn open_stat_channel(&self) -> Result<Arc<dyn StatChannel>, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Metadata and byte-stream channel, separate from the command channel.
#[async_trait]
pub trait StatChannel: Send + Sync {
    /// Returns `None` when the entry does not exist.
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, TransportError>;

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError>;

    async fn reader(&self, path: &str)
    -> Result<Box<dyn AsyncRead + Send + Unpin>, TransportError>;

    async fn writer(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
