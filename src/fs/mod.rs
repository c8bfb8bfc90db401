// ABOUTME: Generic file system contract shared by local and remote trees.
// ABOUTME: Provides streaming copy between any two file systems.

mod local;

pub use local::LocalFileSystem;

use crate::error::Result;
use crate::remote::{RemoteFileSystem, path};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSystemKind {
    Local,
    Remote,
}

/// Capabilities every file system offers, addressed by path string.
#[async_trait]
pub trait FileSystem: Send + Sync {
    fn kind(&self) -> FileSystemKind;

    /// Downcast to the remote implementation.
    fn as_remote(self: Arc<Self>) -> Option<Arc<RemoteFileSystem>> {
        None
    }

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn is_directory(&self, path: &str) -> Result<bool>;

    /// Paths of the direct children of `path`.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    async fn create_directory(&self, path: &str) -> Result<()>;

    async fn reader(&self, path: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn writer(&self, path: &str) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}

/// Copy `from` on `src` to `to` on `dst`, recursing into directories.
///
/// Returns the number of bytes copied.
pub fn copy<'a>(
    src: &'a dyn FileSystem,
    from: &'a str,
    dst: &'a dyn FileSystem,
    to: &'a str,
) -> BoxFuture<'a, Result<u64>> {
    async move {
        if src.is_directory(from).await? {
            dst.create_directory(to).await?;
            let mut total = 0;
            for child in src.list(from).await? {
                let target = path::join(to, path::name(&child));
                total += copy(src, &child, dst, &target).await?;
            }
            return Ok(total);
        }

        let mut reader = src.reader(from).await?;
        let mut writer = dst.writer(to).await?;
        let copied = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;
        tracing::debug!(from, to, bytes = copied, "copied");
        Ok(copied)
    }
    .boxed()
}
