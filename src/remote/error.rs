// ABOUTME: File system error types with SNAFU pattern.
// ABOUTME: Each failure reason is a distinct variant with a matching kind for callers.

use snafu::Snafu;
use std::fmt;

/// Attribute read from a stat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    ModificationTime,
    Size,
    Permissions,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::ModificationTime => "modification time",
            Attribute::Size => "size",
            Attribute::Permissions => "permissions",
        };
        f.write_str(name)
    }
}

/// File system failure. Paths carry the scoped prefix, so messages name the host.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FileSystemError {
    #[snafu(display("{path} does not exist"))]
    NotFound { path: String },

    #[snafu(display("{path}: {attribute} attribute unavailable"))]
    AttributeUnavailable { path: String, attribute: Attribute },

    #[snafu(display("failed to change permissions of {path}: {reason}"))]
    Permission { path: String, reason: String },

    #[snafu(display("failed to create directory {path}: {reason}"))]
    Creation { path: String, reason: String },

    #[snafu(display("failed to list directory {path}: {reason}"))]
    Listing { path: String, reason: String },

    #[snafu(display("failed to delete {path}: {reason}"))]
    Deletion { path: String, reason: String },

    #[snafu(display("failed to transfer {path}: {reason}"))]
    Transfer { path: String, reason: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemErrorKind {
    NotFound,
    AttributeUnavailable,
    Permission,
    Creation,
    Listing,
    Deletion,
    Transfer,
}

impl FileSystemError {
    pub fn kind(&self) -> FileSystemErrorKind {
        match self {
            FileSystemError::NotFound { .. } => FileSystemErrorKind::NotFound,
            FileSystemError::AttributeUnavailable { .. } => {
                FileSystemErrorKind::AttributeUnavailable
            }
            FileSystemError::Permission { .. } => FileSystemErrorKind::Permission,
            FileSystemError::Creation { .. } => FileSystemErrorKind::Creation,
            FileSystemError::Listing { .. } => FileSystemErrorKind::Listing,
            FileSystemError::Deletion { .. } => FileSystemErrorKind::Deletion,
            FileSystemError::Transfer { .. } => FileSystemErrorKind::Transfer,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileSystemError::NotFound { path }
            | FileSystemError::AttributeUnavailable { path, .. }
            | FileSystemError::Permission { path, .. }
            | FileSystemError::Creation { path, .. }
            | FileSystemError::Listing { path, .. }
            | FileSystemError::Deletion { path, .. }
            | FileSystemError::Transfer { path, .. } => path,
        }
    }
}
