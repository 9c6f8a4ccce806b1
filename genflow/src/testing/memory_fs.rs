//! In-memory filesystem for materialization tests.

use crate::errors::GenflowError;
use crate::fs::FileSystem;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

/// Files and directories of an [`InMemoryFileSystem`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsSnapshot {
    /// File contents by path.
    pub files: BTreeMap<PathBuf, Vec<u8>>,
    /// Existing directories.
    pub dirs: BTreeSet<PathBuf>,
}

#[derive(Debug, Default)]
struct State {
    tree: FsSnapshot,
    write_order: Vec<PathBuf>,
    fail_writes: BTreeSet<PathBuf>,
    partial_writes: BTreeSet<PathBuf>,
}

/// A [`FileSystem`] kept entirely in memory.
///
/// Behaves like a strict disk: writes need an existing parent directory and
/// only empty directories can be removed. Paths are compared verbatim.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    state: Mutex<State>,
}

fn not_found(path: &Path) -> GenflowError {
    GenflowError::io(path, io::Error::new(io::ErrorKind::NotFound, "no such file or directory"))
}

fn is_top(path: &Path) -> bool {
    path.parent().is_none() || path.as_os_str().is_empty()
}

impl State {
    fn dir_exists(&self, path: &Path) -> bool {
        is_top(path) || self.tree.dirs.contains(path)
    }

    fn add_dirs(&mut self, path: &Path) -> Result<(), GenflowError> {
        for dir in path.ancestors().filter(|d| !is_top(d)) {
            if self.tree.files.contains_key(dir) {
                return Err(GenflowError::io(
                    dir,
                    io::Error::new(io::ErrorKind::AlreadyExists, "a file is in the way"),
                ));
            }
            self.tree.dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }
}

impl InMemoryFileSystem {
    /// Creates an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file and its parent directories without counting a write.
    pub fn insert_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = path.as_ref();
        let mut state = self.state.lock();
        if let Some(parent) = path.parent() {
            let _ = state.add_dirs(parent);
        }
        state
            .tree
            .files
            .insert(path.to_path_buf(), contents.as_ref().to_vec());
    }

    /// Makes every write to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.state.lock().fail_writes.insert(path.into());
    }

    /// Makes every write to `path` fail after leaving an empty file behind.
    pub fn fail_writes_partially_to(&self, path: impl Into<PathBuf>) {
        self.state.lock().partial_writes.insert(path.into());
    }

    /// Returns a file as UTF-8, if present.
    #[must_use]
    pub fn read_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state
            .lock()
            .tree
            .files
            .get(path.as_ref())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns every file path in sorted order.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.state.lock().tree.files.keys().cloned().collect()
    }

    /// Returns the paths written so far, in write order.
    #[must_use]
    pub fn write_order(&self) -> Vec<PathBuf> {
        self.state.lock().write_order.clone()
    }

    /// Returns the number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().write_order.len()
    }

    /// Returns the total size of all files.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.state.lock().tree.files.values().map(Vec::len).sum()
    }

    /// Captures the current files and directories.
    #[must_use]
    pub fn snapshot(&self) -> FsSnapshot {
        self.state.lock().tree.clone()
    }
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn create_dir_all(&self, path: &Path) -> Result<(), GenflowError> {
        self.state.lock().add_dirs(path)
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), GenflowError> {
        let mut state = self.state.lock();
        if state.fail_writes.contains(path) {
            return Err(GenflowError::io(path, io::Error::other("injected write failure")));
        }
        if state.tree.dirs.contains(path) {
            return Err(GenflowError::io(
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "is a directory"),
            ));
        }
        if !path.parent().map_or(true, |parent| state.dir_exists(parent)) {
            return Err(not_found(path));
        }
        if state.partial_writes.contains(path) {
            state.tree.files.insert(path.to_path_buf(), Vec::new());
            return Err(GenflowError::io(path, io::Error::other("injected partial write")));
        }

        state.tree.files.insert(path.to_path_buf(), contents.to_vec());
        state.write_order.push(path.to_path_buf());
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> bool {
        self.state.lock().tree.files.contains_key(path)
    }

    async fn dir_exists(&self, path: &Path) -> bool {
        self.state.lock().dir_exists(path)
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, GenflowError> {
        self.state
            .lock()
            .tree
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), GenflowError> {
        self.state
            .lock()
            .tree
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), GenflowError> {
        let mut state = self.state.lock();
        if !state.tree.dirs.contains(path) {
            return Err(not_found(path));
        }

        let child_of = |p: &PathBuf| p.parent() == Some(path);
        let occupied =
            state.tree.files.keys().any(child_of) || state.tree.dirs.iter().any(child_of);
        if occupied {
            return Err(GenflowError::io(
                path,
                io::Error::new(io::ErrorKind::Other, "directory not empty"),
            ));
        }

        state.tree.dirs.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_requires_parent() {
        let fs = InMemoryFileSystem::new();
        assert!(fs.write_file(Path::new("/a/b.txt"), b"x").await.is_err());

        fs.create_dir_all(Path::new("/a")).await.unwrap();
        fs.write_file(Path::new("/a/b.txt"), b"x").await.unwrap();
        assert_eq!(fs.read_string("/a/b.txt").as_deref(), Some("x"));
        assert_eq!(fs.write_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_dir_requires_empty() {
        let fs = InMemoryFileSystem::new();
        fs.insert_file("/a/b/c.txt", "c");

        assert!(fs.remove_dir(Path::new("/a/b")).await.is_err());
        fs.remove_file(Path::new("/a/b/c.txt")).await.unwrap();
        fs.remove_dir(Path::new("/a/b")).await.unwrap();
        assert!(!fs.dir_exists(Path::new("/a/b")).await);
        assert!(fs.dir_exists(Path::new("/a")).await);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let fs = InMemoryFileSystem::new();
        fs.fail_writes_to("/x.txt");

        let err = fs.write_file(Path::new("/x.txt"), b"x").await.unwrap_err();
        assert_eq!(err.code(), "FS-IO");
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_partial_failure_leaves_empty_file() {
        let fs = InMemoryFileSystem::new();
        fs.insert_file("/p/a.txt", "full");
        fs.fail_writes_partially_to("/p/a.txt");

        assert!(fs.write_file(Path::new("/p/a.txt"), b"new").await.is_err());
        assert_eq!(fs.read_string("/p/a.txt").as_deref(), Some(""));
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_snapshot_compares_trees() {
        let fs = InMemoryFileSystem::new();
        fs.insert_file("/p/a.txt", "a");
        let before = fs.snapshot();

        fs.insert_file("/p/q/b.txt", "b");
        assert_ne!(fs.snapshot(), before);
        assert!(before.dirs.contains(Path::new("/p")));
    }
}
