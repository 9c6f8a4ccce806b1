//! Filesystem access for materialization.
//!
//! All writes go through the [`FileSystem`] trait so that materialization can
//! run against disk ([`LocalFileSystem`]) or memory
//! ([`InMemoryFileSystem`](crate::testing::InMemoryFileSystem)).

mod content;
mod materializer;
pub mod safety;
mod write_log;

pub use content::{ContentProducer, FileRequest, ModelContentProducer, PlaceholderContent};
pub use materializer::{FileMaterializer, MaterializationReport, WrittenFile};
pub use safety::ensure_within_root;
pub use write_log::WriteLog;

use crate::errors::GenflowError;
use async_trait::async_trait;
use std::path::Path;

/// Asynchronous filesystem primitives.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Creates `path` and every missing ancestor.
    async fn create_dir_all(&self, path: &Path) -> Result<(), GenflowError>;

    /// Writes `contents` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), GenflowError>;

    /// Returns true if `path` is an existing file.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Returns true if `path` is an existing directory.
    async fn dir_exists(&self, path: &Path) -> bool;

    /// Reads the file at `path`.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, GenflowError>;

    /// Removes the file at `path`.
    async fn remove_file(&self, path: &Path) -> Result<(), GenflowError>;

    /// Removes the empty directory at `path`.
    async fn remove_dir(&self, path: &Path) -> Result<(), GenflowError>;
}

/// The local disk, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Creates a local filesystem handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_dir_all(&self, path: &Path) -> Result<(), GenflowError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| GenflowError::io(path, e))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), GenflowError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| GenflowError::io(path, e))
    }

    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    async fn dir_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, GenflowError> {
        tokio::fs::read(path).await.map_err(|e| GenflowError::io(path, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), GenflowError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| GenflowError::io(path, e))
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), GenflowError> {
        tokio::fs::remove_dir(path)
            .await
            .map_err(|e| GenflowError::io(path, e))
    }
}
