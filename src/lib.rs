// ABOUTME: Library root for shellfs - a remote file tree and shell over one SSH session.
// ABOUTME: The CLI binary is in main.rs.

pub mod auth;
pub mod config;
pub mod error;
pub mod fs;
pub mod remote;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use remote::{RemoteFile, RemoteFileSystem};
pub use session::{CommandResult, Session, SessionConfig};
