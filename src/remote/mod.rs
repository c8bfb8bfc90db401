// ABOUTME: Remote file system over an SSH session.
// ABOUTME: Derives attributes from the stat channel and mutates the tree with shell commands.

mod error;
mod file;
pub mod path;

pub use error::{Attribute, FileSystemError, FileSystemErrorKind};
pub use file::RemoteFile;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, FileSystemKind};
use crate::session::{CommandResult, Session};
use crate::transport::FileStat;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use path::shell_quote;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::OnceCell;

/// Mode used for directories created by [`RemoteFileSystem::create`].
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// File system view of a remote host.
pub struct RemoteFileSystem {
    session: Arc<Session>,
    scope: String,
    cwd: OnceCell<String>,
}

impl std::fmt::Debug for RemoteFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileSystem")
            .field("scope", &self.scope)
            .field("cwd", &self.cwd.get())
            .finish()
    }
}

impl RemoteFileSystem {
    pub fn new(session: Arc<Session>) -> Arc<Self> {
        let scope = path::scope(session.host(), session.port());
        Arc::new(Self {
            session,
            scope,
            cwd: OnceCell::new(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Prefix that marks paths as belonging to this host, e.g. `sftp://host:22`.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Handle for `path`; a scoped prefix on `path` is stripped.
    pub fn get_file(self: &Arc<Self>, path: &str) -> RemoteFile {
        RemoteFile::new(Arc::clone(self), path)
    }

    /// Remote working directory, queried once and cached.
    pub async fn current_working_directory(&self) -> Result<String> {
        let cwd = self
            .cwd
            .get_or_try_init(|| async {
                let result = self.session.execute("pwd", false).await?;
                let dir = result
                    .first_line()
                    .filter(|line| !line.is_empty())
                    .ok_or_else(|| Error::Execution {
                        host: self.session.host().to_string(),
                        command: "pwd".to_string(),
                        stderr: "no working directory reported".to_string(),
                    })?;
                tracing::debug!(
                    host = %self.session.host(),
                    cwd = dir,
                    "resolved working directory"
                );
                Ok::<_, Error>(path::normalize(dir))
            })
            .await?;
        Ok(cwd.clone())
    }

    pub(crate) fn cached_cwd(&self) -> Option<&str> {
        self.cwd.get().map(String::as_str)
    }

    /// Normalized absolute path of `file`, without the scoped prefix.
    pub async fn resolve(&self, file: &RemoteFile) -> Result<String> {
        self.resolve_path(file.local_path()).await
    }

    /// Normalized absolute path of `file` with the scoped prefix applied.
    pub async fn absolute_path(&self, file: &RemoteFile) -> Result<String> {
        let resolved = self.resolve(file).await?;
        Ok(self.scoped(&resolved))
    }

    pub fn is_absolute(&self, file: &RemoteFile) -> bool {
        path::is_absolute(file.local_path())
    }

    pub fn is_root_path(path: &str) -> bool {
        path::is_root(path)
    }

    pub async fn parent(self: &Arc<Self>, file: &RemoteFile) -> Result<RemoteFile> {
        match path::parent(file.local_path()) {
            Some(parent) => Ok(self.get_file(&parent)),
            None => {
                let cwd = self.resolve_path(".").await?;
                Ok(self.get_file(&cwd))
            }
        }
    }

    pub async fn exists(&self, file: &RemoteFile) -> Result<bool> {
        Ok(self.stat(file).await?.is_some())
    }

    pub async fn is_directory(&self, file: &RemoteFile) -> Result<bool> {
        Ok(self.stat(file).await?.is_some_and(|s| s.is_dir()))
    }

    pub async fn is_readable(&self, file: &RemoteFile) -> Result<bool> {
        Ok(self.stat(file).await?.is_some_and(|s| s.is_owner_readable()))
    }

    pub async fn is_writable(&self, file: &RemoteFile) -> Result<bool> {
        Ok(self.stat(file).await?.is_some_and(|s| s.is_owner_writable()))
    }

    /// Hidden means the name starts with a dot.
    pub fn is_hidden(&self, file: &RemoteFile) -> bool {
        file.name().starts_with('.')
    }

    /// Modification time in seconds since the Unix epoch.
    pub async fn modification_time(&self, file: &RemoteFile) -> Result<u64> {
        let (abs, stat) = self.require_stat(file).await?;
        stat.mtime
            .ok_or_else(|| self.unavailable(&abs, Attribute::ModificationTime))
    }

    pub async fn size(&self, file: &RemoteFile) -> Result<u64> {
        let (abs, stat) = self.require_stat(file).await?;
        stat.size.ok_or_else(|| self.unavailable(&abs, Attribute::Size))
    }

    /// Permission bits (`0o7777` range) of `file`.
    pub async fn permissions(&self, file: &RemoteFile) -> Result<u32> {
        let (abs, stat) = self.require_stat(file).await?;
        // Real entries always carry file-type bits; zero means the server sent no mode.
        if stat.mode == 0 {
            return Err(self.unavailable(&abs, Attribute::Permissions));
        }
        Ok(stat.permissions())
    }

    pub async fn set_permissions(&self, file: &RemoteFile, bits: u32) -> Result<()> {
        let (abs, _) = self.require_stat(file).await?;
        let command = format!("chmod {:o} {}", bits, shell_quote(&abs));
        self.run_checked(&command)
            .await?
            .map_err(|reason| FileSystemError::Permission {
                path: self.scoped(&abs),
                reason,
            })?;
        Ok(())
    }

    /// Create `dir` and any missing ancestors. Existing entries are left alone.
    pub async fn create(&self, dir: &RemoteFile) -> Result<()> {
        let abs = self.resolve(dir).await?;
        self.create_at(&abs).await
    }

    /// Entries of `dir` keyed by resolved path.
    ///
    /// Recursion descends only into real directories; symbolic links are listed
    /// but not followed.
    pub async fn read_directory(
        self: &Arc<Self>,
        dir: &RemoteFile,
        recursive: bool,
    ) -> Result<BTreeMap<String, RemoteFile>> {
        let abs = self.resolve(dir).await?;
        let mut listed = Vec::new();
        self.list_at(abs, recursive, &mut listed).await?;

        let mut entries = BTreeMap::new();
        for (child, _) in listed {
            let file = self.get_file(&child);
            entries.insert(child, file);
        }
        Ok(entries)
    }

    /// Remove `file` recursively. Missing files are not an error.
    pub async fn delete(&self, file: &RemoteFile) -> Result<()> {
        let abs = self.resolve(file).await?;
        if self.stat_at(&abs).await?.is_none() {
            return Ok(());
        }
        let command = format!("rm -rf {}", shell_quote(&abs));
        self.run_checked(&command)
            .await?
            .map_err(|reason| FileSystemError::Deletion {
                path: self.scoped(&abs),
                reason,
            })?;
        tracing::debug!(path = %abs, "deleted");
        Ok(())
    }

    /// Fresh stat record for `file`; `None` when it does not exist.
    pub async fn stat(&self, file: &RemoteFile) -> Result<Option<FileStat>> {
        let abs = self.resolve(file).await?;
        self.stat_at(&abs).await
    }

    pub async fn reader(&self, file: &RemoteFile) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let abs = self.resolve(file).await?;
        self.reader_at(&abs).await
    }

    pub async fn writer(&self, file: &RemoteFile) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let abs = self.resolve(file).await?;
        self.writer_at(&abs).await
    }

    pub(crate) fn scoped(&self, abs: &str) -> String {
        format!("{}{}", self.scope, abs)
    }

    async fn resolve_path(&self, path: &str) -> Result<String> {
        let local = path::strip_scope(path, &self.scope);
        if path::is_absolute(local) {
            return Ok(path::normalize(local));
        }
        let cwd = self.current_working_directory().await?;
        Ok(path::normalize(&path::join(&cwd, local)))
    }

    fn unavailable(&self, abs: &str, attribute: Attribute) -> Error {
        FileSystemError::AttributeUnavailable {
            path: self.scoped(abs),
            attribute,
        }
        .into()
    }

    async fn require_stat(&self, file: &RemoteFile) -> Result<(String, FileStat)> {
        let abs = self.resolve(file).await?;
        match self.stat_at(&abs).await? {
            Some(stat) => Ok((abs, stat)),
            None => Err(FileSystemError::NotFound {
                path: self.scoped(&abs),
            }
            .into()),
        }
    }

    async fn stat_at(&self, abs: &str) -> Result<Option<FileStat>> {
        let channel = self.session.stat_channel().await?;
        Ok(channel.stat(abs).await?)
    }

    async fn create_at(&self, abs: &str) -> Result<()> {
        if self.stat_at(abs).await?.is_some() {
            return Ok(());
        }
        let channel = self.session.stat_channel().await?;
        channel
            .mkdir(abs, DEFAULT_DIRECTORY_MODE, true)
            .await
            .map_err(|e| FileSystemError::Creation {
                path: self.scoped(abs),
                reason: e.to_string(),
            })?;
        tracing::debug!(path = %abs, "created directory");
        Ok(())
    }

    /// Collect `(path, is_directory)` for each entry under `dir`.
    fn list_at<'a>(
        &'a self,
        dir: String,
        recursive: bool,
        out: &'a mut Vec<(String, bool)>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let command = format!("ls -1Ap {}", shell_quote(&dir));
            let output = self
                .run_checked(&command)
                .await?
                .map_err(|reason| FileSystemError::Listing {
                    path: self.scoped(&dir),
                    reason,
                })?;

            for line in output.lines.iter().filter(|line| !line.is_empty()) {
                let (name, is_dir) = match line.strip_suffix('/') {
                    Some(name) => (name, true),
                    None => (line.as_str(), false),
                };
                let child = path::join(&dir, name);
                out.push((child.clone(), is_dir));
                if recursive && is_dir {
                    self.list_at(child, true, out).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn reader_at(&self, abs: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let channel = self.session.stat_channel().await?;
        channel.reader(abs).await.map_err(|e| {
            FileSystemError::Transfer {
                path: self.scoped(abs),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn writer_at(&self, abs: &str) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let channel = self.session.stat_channel().await?;
        channel.writer(abs).await.map_err(|e| {
            FileSystemError::Transfer {
                path: self.scoped(abs),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Run a command that must exit zero. `Ok(Err(reason))` reports a failed command;
    /// connection-level failures propagate as the outer error.
    async fn run_checked(
        &self,
        command: &str,
    ) -> Result<std::result::Result<CommandResult, String>> {
        match self.session.execute(command, true).await {
            Ok(result) if result.success() => Ok(Ok(result)),
            Ok(result) => Ok(Err(format!(
                "`{}` exited with status {}",
                command,
                result.exit_code.unwrap_or_default()
            ))),
            Err(Error::Execution { stderr, .. }) => Ok(Err(stderr)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl FileSystem for RemoteFileSystem {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Remote
    }

    fn as_remote(self: Arc<Self>) -> Option<Arc<RemoteFileSystem>> {
        Some(self)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let abs = self.resolve_path(path).await?;
        Ok(self.stat_at(&abs).await?.is_some())
    }

    async fn is_directory(&self, path: &str) -> Result<bool> {
        let abs = self.resolve_path(path).await?;
        Ok(self.stat_at(&abs).await?.is_some_and(|s| s.is_dir()))
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let abs = self.resolve_path(path).await?;
        let mut listed = Vec::new();
        self.list_at(abs, false, &mut listed).await?;
        Ok(listed.into_iter().map(|(child, _)| child).collect())
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let abs = self.resolve_path(path).await?;
        self.create_at(&abs).await
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let abs = self.resolve_path(path).await?;
        self.reader_at(&abs).await
    }

    async fn writer(&self, path: &str) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let abs = self.resolve_path(path).await?;
        self.writer_at(&abs).await
    }
}
