// ABOUTME: File handle pairing a remote file system with a path.
// ABOUTME: Every operation delegates to the owning RemoteFileSystem.

use super::{RemoteFileSystem, path};
use crate::error::{Error, Result};
use crate::fs::{self, FileSystem};
use crate::transport::FileStat;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// A path on one remote file system.
///
/// Equality and hashing use the path resolved against the working directory
/// as known when the handle was built. A relative handle built before the
/// working directory was first queried keeps its normalized relative form.
#[derive(Clone)]
pub struct RemoteFile {
    fs: Arc<RemoteFileSystem>,
    path: String,
    key: String,
}

impl RemoteFile {
    pub fn new(fs: Arc<RemoteFileSystem>, path: &str) -> Self {
        let path = path::strip_scope(path, fs.scope()).to_string();
        let key = identity(&fs, &path);
        Self { fs, path, key }
    }

    /// Build a handle from a generic file system, which must be remote.
    pub fn from_generic(fs: Arc<dyn FileSystem>, path: &str) -> Result<Self> {
        let kind = fs.kind();
        let remote = fs.as_remote().ok_or_else(|| {
            Error::Configuration(format!(
                "remote files require a remote file system, got {:?}",
                kind
            ))
        })?;
        Ok(Self::new(remote, path))
    }

    pub fn file_system(&self) -> &Arc<RemoteFileSystem> {
        &self.fs
    }

    /// Path as used inside shell commands, without the scoped prefix.
    pub fn local_path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        path::name(&self.path)
    }

    pub fn child(&self, name: &str) -> RemoteFile {
        RemoteFile::new(Arc::clone(&self.fs), &path::join(&self.path, name))
    }

    pub async fn absolute_path(&self) -> Result<String> {
        self.fs.absolute_path(self).await
    }

    pub async fn resolve(&self) -> Result<String> {
        self.fs.resolve(self).await
    }

    pub fn is_absolute(&self) -> bool {
        self.fs.is_absolute(self)
    }

    pub async fn parent(&self) -> Result<RemoteFile> {
        self.fs.parent(self).await
    }

    pub async fn exists(&self) -> Result<bool> {
        self.fs.exists(self).await
    }

    pub async fn is_directory(&self) -> Result<bool> {
        self.fs.is_directory(self).await
    }

    pub async fn is_readable(&self) -> Result<bool> {
        self.fs.is_readable(self).await
    }

    pub async fn is_writable(&self) -> Result<bool> {
        self.fs.is_writable(self).await
    }

    pub fn is_hidden(&self) -> bool {
        self.fs.is_hidden(self)
    }

    pub async fn modification_time(&self) -> Result<u64> {
        self.fs.modification_time(self).await
    }

    pub async fn size(&self) -> Result<u64> {
        self.fs.size(self).await
    }

    pub async fn permissions(&self) -> Result<u32> {
        self.fs.permissions(self).await
    }

    pub async fn set_permissions(&self, bits: u32) -> Result<()> {
        self.fs.set_permissions(self, bits).await
    }

    pub async fn create(&self) -> Result<()> {
        self.fs.create(self).await
    }

    pub async fn read_directory(&self, recursive: bool) -> Result<BTreeMap<String, RemoteFile>> {
        self.fs.read_directory(self, recursive).await
    }

    pub async fn delete(&self) -> Result<()> {
        self.fs.delete(self).await
    }

    pub async fn stat(&self) -> Result<Option<FileStat>> {
        self.fs.stat(self).await
    }

    pub async fn reader(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.fs.reader(self).await
    }

    pub async fn writer(&self) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        self.fs.writer(self).await
    }

    /// Stream this file (or tree) into `to` on any file system.
    pub async fn copy_to(&self, dst: &dyn FileSystem, to: &str) -> Result<u64> {
        fs::copy(&*self.fs, &self.path, dst, to).await
    }
}

fn identity(fs: &RemoteFileSystem, file: &str) -> String {
    if path::is_absolute(file) {
        return path::normalize(file);
    }
    match fs.cached_cwd() {
        Some(cwd) => path::normalize(&path::join(cwd, file)),
        None => path::normalize(file)
            .trim_start_matches(path::SEPARATOR)
            .to_string(),
    }
}

impl PartialEq for RemoteFile {
    fn eq(&self, other: &Self) -> bool {
        self.fs.scope() == other.fs.scope() && self.key == other.key
    }
}

impl Eq for RemoteFile {}

impl Hash for RemoteFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fs.scope().hash(state);
        self.key.hash(state);
    }
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("scope", &self.fs.scope())
            .field("path", &self.path)
            .finish()
    }
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if path::is_absolute(&self.path) {
            write!(f, "{}{}", self.fs.scope(), self.path)
        } else {
            f.write_str(&self.path)
        }
    }
}
