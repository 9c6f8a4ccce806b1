//! Record of completed writes, used to undo a partial materialization.

use super::FileSystem;
use crate::errors::GenflowError;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
struct WriteRecord {
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

/// Writes and directory creations performed by one materialization.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    writes: Vec<WriteRecord>,
    created_dirs: Vec<PathBuf>,
}

impl WriteLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed write and the content it replaced.
    pub fn record_write(&mut self, path: impl Into<PathBuf>, previous: Option<Vec<u8>>) {
        self.writes.push(WriteRecord {
            path: path.into(),
            previous,
        });
    }

    /// Records a directory that did not exist before this run.
    pub fn record_dir(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.created_dirs.contains(&path) {
            self.created_dirs.push(path);
        }
    }

    /// Returns the written paths in write order.
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.writes.iter().map(|w| w.path.as_path())
    }

    /// Returns the directories created by this run.
    #[must_use]
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.created_dirs.is_empty()
    }

    /// Undoes every recorded change.
    ///
    /// Writes are undone newest first: replaced files get their previous
    /// content back and new files are removed. Created directories are then
    /// removed deepest first. Every step is attempted; the first failure is
    /// returned at the end.
    pub async fn rollback(&self, fs: &dyn FileSystem) -> Result<(), GenflowError> {
        let mut first_error: Option<GenflowError> = None;
        let mut note = |result: Result<(), GenflowError>| {
            if let Err(err) = result {
                warn!(error = %err, "Rollback step failed");
                first_error.get_or_insert(err);
            }
        };

        for record in self.writes.iter().rev() {
            match &record.previous {
                Some(previous) => note(fs.write_file(&record.path, previous).await),
                None => note(fs.remove_file(&record.path).await),
            }
        }

        let mut dirs: Vec<&PathBuf> = self.created_dirs.iter().collect();
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in dirs {
            note(fs.remove_dir(dir).await);
        }

        first_error.map_or(Ok(()), Err)
    }
}
