// ABOUTME: Local file system implementation over tokio::fs.
// ABOUTME: Lets remote files be copied to and from the local disk.

use super::{FileSystem, FileSystemKind};
use crate::error::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Local
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn is_directory(&self, path: &str) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(path).await?;
        let mut children = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            children.push(entry.path().to_string_lossy().into_owned());
        }
        children.sort();
        Ok(children)
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn writer(&self, path: &str) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(file))
    }
}
