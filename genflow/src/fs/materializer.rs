//! Dependency-ordered, traversal-safe file writing.

use super::content::{ContentProducer, FileRequest};
use super::safety::ensure_within_root;
use super::write_log::WriteLog;
use super::FileSystem;
use crate::cancellation::CancellationToken;
use crate::errors::GenflowError;
use crate::events::{self, EventSink, NoOpEventSink};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One file written by a materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    /// Project-root-relative path as requested.
    pub path: String,
    /// Bytes written.
    pub bytes: usize,
    /// Hex SHA-256 of the content.
    pub sha256: String,
    /// True if an existing file was replaced.
    pub overwritten: bool,
}

/// Outcome of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializationReport {
    /// Project root every file was written under.
    pub root: PathBuf,
    /// Files in write order.
    pub written: Vec<WrittenFile>,
}

impl MaterializationReport {
    /// Returns the written paths in write order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.written.iter().map(|f| f.path.as_str())
    }

    /// Returns the number of files written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.written.len()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Returns the total number of bytes written.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.written.iter().map(|f| f.bytes).sum()
    }
}

/// Writes files one at a time under a project root.
///
/// Every target is checked against the root before the first write. On a
/// failure midway the completed writes are undone unless rollback is turned
/// off.
pub struct FileMaterializer {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    rollback_on_failure: bool,
    cancellation: Option<Arc<CancellationToken>>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for FileMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMaterializer")
            .field("root", &self.root)
            .field("rollback_on_failure", &self.rollback_on_failure)
            .finish_non_exhaustive()
    }
}

impl FileMaterializer {
    /// Creates a materializer writing under `root`.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            rollback_on_failure: true,
            cancellation: None,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Enables or disables rollback of partial writes.
    #[must_use]
    pub const fn with_rollback(mut self, enabled: bool) -> Self {
        self.rollback_on_failure = enabled;
        self
    }

    /// Checks `token` before every write.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes every requested file in order.
    pub async fn materialize(
        &self,
        requests: &[FileRequest],
        producer: &dyn ContentProducer,
    ) -> Result<MaterializationReport, GenflowError> {
        let targets = requests
            .iter()
            .map(|request| ensure_within_root(&self.root, &request.path))
            .collect::<Result<Vec<_>, _>>()?;

        let mut log = WriteLog::new();
        let mut written = Vec::with_capacity(requests.len());

        for (request, target) in requests.iter().zip(&targets) {
            match self.write_one(request, target, producer, &mut log).await {
                Ok(file) => written.push(file),
                Err(err) => {
                    self.undo(&log, &err).await;
                    return Err(err);
                }
            }
        }

        Ok(MaterializationReport {
            root: self.root.clone(),
            written,
        })
    }

    async fn write_one(
        &self,
        request: &FileRequest,
        target: &Path,
        producer: &dyn ContentProducer,
        log: &mut WriteLog,
    ) -> Result<WrittenFile, GenflowError> {
        if let Some(token) = &self.cancellation {
            token.check()?;
        }

        if let Some(parent) = target.parent() {
            let mut missing = Vec::new();
            for dir in parent.ancestors() {
                if dir.as_os_str().is_empty() || self.fs.dir_exists(dir).await {
                    break;
                }
                missing.push(dir.to_path_buf());
            }
            if !missing.is_empty() {
                self.fs.create_dir_all(parent).await?;
                for dir in missing {
                    log.record_dir(dir);
                }
            }
        }

        let previous = if self.fs.file_exists(target).await {
            Some(self.fs.read_file(target).await?)
        } else {
            None
        };

        let content = producer.produce(request).await?;
        if let Err(err) = self.fs.write_file(target, content.as_bytes()).await {
            // A failed write can still leave a truncated or new file behind.
            if previous.is_some() || self.fs.file_exists(target).await {
                log.record_write(target, previous);
            }
            return Err(err);
        }

        let overwritten = previous.is_some();
        log.record_write(target, previous);

        let file = WrittenFile {
            path: request.path.clone(),
            bytes: content.len(),
            sha256: hex::encode(Sha256::digest(content.as_bytes())),
            overwritten,
        };
        debug!(path = %file.path, bytes = file.bytes, overwritten, "Wrote file");
        self.event_sink.emit(
            events::FILE_WRITTEN,
            serde_json::json!({
                "path": file.path,
                "bytes": file.bytes,
                "sha256": file.sha256,
                "overwritten": overwritten,
            }),
        );
        Ok(file)
    }

    async fn undo(&self, log: &WriteLog, cause: &GenflowError) {
        if !self.rollback_on_failure || log.is_empty() {
            return;
        }

        let files = log.written().count();
        let dirs = log.created_dirs().len();
        warn!(files, dirs, error = %cause, "Rolling back partial materialization");

        let rollback = log.rollback(self.fs.as_ref()).await;
        if let Err(err) = &rollback {
            warn!(error = %err, "Rollback incomplete");
        }
        self.event_sink.emit(
            events::MATERIALIZE_ROLLED_BACK,
            serde_json::json!({
                "files": files,
                "dirs": dirs,
                "cause": cause.code(),
                "complete": rollback.is_ok(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::fs::{LocalFileSystem, PlaceholderContent};
    use crate::testing::InMemoryFileSystem;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FailOn(&'static str);

    #[async_trait]
    impl ContentProducer for FailOn {
        async fn produce(&self, request: &FileRequest) -> Result<String, GenflowError> {
            if request.path == self.0 {
                Err(GenflowError::Internal(format!("cannot produce {}", request.path)))
            } else {
                Ok(format!("content of {}", request.path))
            }
        }
    }

    fn requests(paths: &[&str]) -> Vec<FileRequest> {
        paths
            .iter()
            .map(|p| FileRequest::new(*p, Vec::<String>::new()))
            .collect()
    }

    #[tokio::test]
    async fn test_writes_in_order_with_report() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let sink = Arc::new(CollectingEventSink::new());
        let materializer =
            FileMaterializer::new(fs.clone(), "/root/app").with_event_sink(sink.clone());

        let report = materializer
            .materialize(&requests(&["src/a.ts", "src/lib/b.ts"]), &PlaceholderContent)
            .await
            .unwrap();

        assert_eq!(report.paths().collect::<Vec<_>>(), vec!["src/a.ts", "src/lib/b.ts"]);
        assert_eq!(fs.write_order(), vec![PathBuf::from("/root/app/src/a.ts"), PathBuf::from("/root/app/src/lib/b.ts")]);
        assert_eq!(report.written[0].sha256.len(), 64);
        assert_eq!(report.total_bytes(), fs.total_bytes());
        assert_eq!(sink.events_of_type(events::FILE_WRITTEN).len(), 2);
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_any_write() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let materializer = FileMaterializer::new(fs.clone(), "/root/app");

        let err = materializer
            .materialize(&requests(&["sub/file.ts", "../../etc/passwd"]), &PlaceholderContent)
            .await
            .unwrap_err();

        assert!(matches!(err, GenflowError::UnauthorizedAccess(_)));
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_to_previous_state() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.insert_file("/p/src/a.ts", "original");
        let before = fs.snapshot();
        let sink = Arc::new(CollectingEventSink::new());

        let err = FileMaterializer::new(fs.clone(), "/p")
            .with_event_sink(sink.clone())
            .materialize(&requests(&["src/a.ts", "src/new/b.ts", "src/c.ts"]), &FailOn("src/c.ts"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenflowError::Internal(_)));
        assert_eq!(fs.snapshot(), before);
        assert_eq!(sink.events_of_type(events::MATERIALIZE_ROLLED_BACK).len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_removes_partially_written_files() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.insert_file("/p/src/a.ts", "original");
        let before = fs.snapshot();
        fs.fail_writes_partially_to("/p/src/b.ts");

        let err = FileMaterializer::new(fs.clone(), "/p")
            .materialize(&requests(&["src/a.ts", "src/b.ts"]), &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FS-IO");
        assert_eq!(fs.snapshot(), before);
        assert_eq!(fs.read_string("/p/src/a.ts").as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_rollback_restores_file_truncated_by_failed_write() {
        let fs = Arc::new(InMemoryFileSystem::new());
        fs.insert_file("/p/a.ts", "original");
        let before = fs.snapshot();
        fs.fail_writes_partially_to("/p/a.ts");

        FileMaterializer::new(fs.clone(), "/p")
            .materialize(&requests(&["a.ts"]), &PlaceholderContent)
            .await
            .unwrap_err();

        assert_eq!(fs.snapshot(), before);
    }

    #[tokio::test]
    async fn test_failure_without_rollback_keeps_partial_writes() {
        let fs = Arc::new(InMemoryFileSystem::new());

        FileMaterializer::new(fs.clone(), "/p")
            .with_rollback(false)
            .materialize(&requests(&["a.ts", "b.ts"]), &FailOn("b.ts"))
            .await
            .unwrap_err();

        assert_eq!(fs.read_string("/p/a.ts").as_deref(), Some("content of a.ts"));
    }

    #[tokio::test]
    async fn test_cancellation_between_writes() {
        let fs = Arc::new(InMemoryFileSystem::new());
        let token = Arc::new(CancellationToken::new());
        token.cancel("user abort");

        let err = FileMaterializer::new(fs.clone(), "/p")
            .with_cancellation(token)
            .materialize(&requests(&["a.ts"]), &PlaceholderContent)
            .await
            .unwrap_err();

        assert!(matches!(err, GenflowError::Cancelled(_)));
        assert_eq!(fs.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_over_written_tree_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = FileMaterializer::new(Arc::new(LocalFileSystem), dir.path());
        let plan = requests(&["src/a.ts", "src/nested/b.ts"]);

        let first = materializer.materialize(&plan, &PlaceholderContent).await.unwrap();
        let second = materializer.materialize(&plan, &PlaceholderContent).await.unwrap();

        assert_eq!(first.paths().collect::<Vec<_>>(), second.paths().collect::<Vec<_>>());
        assert!(second.written.iter().all(|f| f.overwritten));
        assert!(dir.path().join("src/nested/b.ts").is_file());
    }

    #[tokio::test]
    async fn test_rollback_on_real_disk() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileMaterializer::new(Arc::new(LocalFileSystem), dir.path())
            .materialize(&requests(&["x/one.ts", "x/y/two.ts"]), &FailOn("x/y/two.ts"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INTERNAL");
        assert!(!dir.path().join("x").exists());
        assert!(dir.path().exists());
    }
}
